use super::*;
use crate::{SENSOR_ID_MASK, SensorId, WakeMode};

// packet structure : id(1) + body, body length fixed by the id

/// Half of the 32-bit system timestamp carried by a timestamp packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampHalf {
    /// Low 16 bits.
    Lsw,
    /// High 16 bits.
    Msw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaEventType {
    FlushComplete = 1,
    SampleRateChanged = 2,
    PowerModeChanged = 3,
    Error = 4,
    SensorError = 6,
    FifoOverflow = 7,
    DynamicRangeChanged = 8,
    FifoWatermark = 9,
    SelfTestResults = 10,
    Initialized = 11,
}

impl TryFrom<u8> for MetaEventType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(MetaEventType::FlushComplete),
            2 => Ok(MetaEventType::SampleRateChanged),
            3 => Ok(MetaEventType::PowerModeChanged),
            4 => Ok(MetaEventType::Error),
            6 => Ok(MetaEventType::SensorError),
            7 => Ok(MetaEventType::FifoOverflow),
            8 => Ok(MetaEventType::DynamicRangeChanged),
            9 => Ok(MetaEventType::FifoWatermark),
            10 => Ok(MetaEventType::SelfTestResults),
            11 => Ok(MetaEventType::Initialized),
            _ => Err(ProtocolError::UnknownPacketId(value)),
        }
    }
}

/// Out-of-band notification from the coprocessor firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaEvent {
    pub event_type: u8,
    pub sensor: u8,
    pub value: u8,
}

impl MetaEvent {
    pub fn kind(&self) -> Option<MetaEventType> {
        MetaEventType::try_from(self.event_type).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorValue {
    Vector { x: i16, y: i16, z: i16, status: u8 },
    Quaternion { x: i16, y: i16, z: i16, w: i16, accuracy: i16 },
    Uncalibrated { values: [i16; 6], status: u8 },
    U8(u8),
    U16(u16),
    I16(i16),
    /// Only the low 24 bits are transmitted.
    U24(u32),
}

impl SensorValue {
    pub const fn layout(&self) -> Layout {
        match self {
            SensorValue::Vector { .. } => Layout::Vector,
            SensorValue::Quaternion { .. } => Layout::Quaternion,
            SensorValue::Uncalibrated { .. } => Layout::Uncalibrated,
            SensorValue::U8(_) => Layout::ScalarU8,
            SensorValue::U16(_) => Layout::ScalarU16,
            SensorValue::I16(_) => Layout::ScalarI16,
            SensorValue::U24(_) => Layout::ScalarU24,
        }
    }

    /// `body` must hold exactly `layout.payload_len()` bytes.
    fn read(layout: Layout, body: &[u8]) -> Self {
        let i16_at = |i: usize| i16::from_le_bytes([body[i], body[i + 1]]);

        match layout {
            Layout::Vector => SensorValue::Vector {
                x: i16_at(0),
                y: i16_at(2),
                z: i16_at(4),
                status: body[6],
            },
            Layout::Quaternion => SensorValue::Quaternion {
                x: i16_at(0),
                y: i16_at(2),
                z: i16_at(4),
                w: i16_at(6),
                accuracy: i16_at(8),
            },
            Layout::Uncalibrated => SensorValue::Uncalibrated {
                values: core::array::from_fn(|n| i16_at(n * 2)),
                status: body[12],
            },
            Layout::ScalarU8 => SensorValue::U8(body[0]),
            Layout::ScalarU16 => SensorValue::U16(u16::from_le_bytes([body[0], body[1]])),
            Layout::ScalarI16 => SensorValue::I16(i16_at(0)),
            Layout::ScalarU24 => {
                SensorValue::U24(u32::from_le_bytes([body[0], body[1], body[2], 0]))
            }
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match *self {
            SensorValue::Vector { x, y, z, status } => {
                for v in [x, y, z] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                out.push(status);
            }
            SensorValue::Quaternion {
                x,
                y,
                z,
                w,
                accuracy,
            } => {
                for v in [x, y, z, w, accuracy] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            SensorValue::Uncalibrated { values, status } => {
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                out.push(status);
            }
            SensorValue::U8(v) => out.push(v),
            SensorValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            SensorValue::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            SensorValue::U24(v) => out.extend_from_slice(&v.to_le_bytes()[..3]),
        }
    }
}

/// A decoded virtual sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEvent {
    pub sensor_type: SensorType,
    pub mode: WakeMode,
    pub value: SensorValue,
}

impl SensorEvent {
    pub fn new(sensor_type: SensorType, mode: WakeMode, value: SensorValue) -> ParseResult<Self> {
        if value.layout() != sensor_type.layout() {
            return Err(ProtocolError::LayoutMismatch(sensor_type));
        }

        Ok(Self {
            sensor_type,
            mode,
            value,
        })
    }

    pub const fn id(&self) -> SensorId {
        SensorId::new(self.sensor_type as u8)
    }

    pub const fn raw_id(&self) -> u8 {
        self.id().raw(self.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoPacket {
    Padding,
    Timestamp {
        half: TimestampHalf,
        mode: WakeMode,
        value: u16,
    },
    Meta {
        mode: WakeMode,
        event: MetaEvent,
    },
    Debug {
        flags: u8,
        data: [u8; DEBUG_DATA_LEN],
    },
    Sensor(SensorEvent),
}

/// A packet together with the number of FIFO bytes it occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub packet: FifoPacket,
    pub len: usize,
}

impl FifoPacket {
    /// Split a 32-bit timestamp into its MSW and LSW packets, in FIFO order.
    pub fn timestamp_pair(ticks: u32, mode: WakeMode) -> [FifoPacket; 2] {
        [
            FifoPacket::Timestamp {
                half: TimestampHalf::Msw,
                mode,
                value: (ticks >> 16) as u16,
            },
            FifoPacket::Timestamp {
                half: TimestampHalf::Lsw,
                mode,
                value: ticks as u16,
            },
        ]
    }

    /// Length of the packet starting with `id`, including the id byte.
    pub fn packet_len(id: u8) -> ParseResult<usize> {
        match id {
            PADDING_ID => Ok(1),
            TIMESTAMP_LSW_ID | TIMESTAMP_MSW_ID | TIMESTAMP_LSW_WAKEUP_ID
            | TIMESTAMP_MSW_WAKEUP_ID => Ok(3),
            META_EVENT_ID | META_EVENT_WAKEUP_ID => Ok(4),
            DEBUG_ID => Ok(2 + DEBUG_DATA_LEN),
            1..=31 | 33..=63 => SensorType::try_from(id & SENSOR_ID_MASK)
                .map(SensorType::packet_len)
                .map_err(|_| ProtocolError::UnknownPacketId(id)),
            _ => Err(ProtocolError::UnknownPacketId(id)),
        }
    }

    pub fn decode(bytes: &[u8]) -> ParseResult<Decoded> {
        let Some(&id) = bytes.first() else {
            return Err(ProtocolError::Empty);
        };

        let len = Self::packet_len(id)?;
        if bytes.len() < len {
            return Err(ProtocolError::Truncated {
                needed: len,
                available: bytes.len(),
            });
        }

        let body = &bytes[1..len];

        let packet = match id {
            PADDING_ID => FifoPacket::Padding,
            TIMESTAMP_LSW_ID | TIMESTAMP_MSW_ID | TIMESTAMP_LSW_WAKEUP_ID
            | TIMESTAMP_MSW_WAKEUP_ID => {
                let half = match id {
                    TIMESTAMP_LSW_ID | TIMESTAMP_LSW_WAKEUP_ID => TimestampHalf::Lsw,
                    _ => TimestampHalf::Msw,
                };
                let mode = match id {
                    TIMESTAMP_LSW_WAKEUP_ID | TIMESTAMP_MSW_WAKEUP_ID => WakeMode::Wakeup,
                    _ => WakeMode::NonWakeup,
                };

                FifoPacket::Timestamp {
                    half,
                    mode,
                    value: u16::from_le_bytes([body[0], body[1]]),
                }
            }
            META_EVENT_ID | META_EVENT_WAKEUP_ID => FifoPacket::Meta {
                mode: if id == META_EVENT_WAKEUP_ID {
                    WakeMode::Wakeup
                } else {
                    WakeMode::NonWakeup
                },
                event: MetaEvent {
                    event_type: body[0],
                    sensor: body[1],
                    value: body[2],
                },
            },
            DEBUG_ID => {
                let mut data = [0u8; DEBUG_DATA_LEN];
                data.copy_from_slice(&body[1..]);
                FifoPacket::Debug {
                    flags: body[0],
                    data,
                }
            }
            _ => {
                let sensor_type = SensorType::try_from(id & SENSOR_ID_MASK)?;
                FifoPacket::Sensor(SensorEvent {
                    sensor_type,
                    mode: WakeMode::of_raw(id),
                    value: SensorValue::read(sensor_type.layout(), body),
                })
            }
        };

        Ok(Decoded { packet, len })
    }

    pub fn raw_id(&self) -> u8 {
        match self {
            FifoPacket::Padding => PADDING_ID,
            FifoPacket::Timestamp { half, mode, .. } => match (half, mode) {
                (TimestampHalf::Lsw, WakeMode::NonWakeup) => TIMESTAMP_LSW_ID,
                (TimestampHalf::Msw, WakeMode::NonWakeup) => TIMESTAMP_MSW_ID,
                (TimestampHalf::Lsw, WakeMode::Wakeup) => TIMESTAMP_LSW_WAKEUP_ID,
                (TimestampHalf::Msw, WakeMode::Wakeup) => TIMESTAMP_MSW_WAKEUP_ID,
            },
            FifoPacket::Meta { mode, .. } => match mode {
                WakeMode::NonWakeup => META_EVENT_ID,
                WakeMode::Wakeup => META_EVENT_WAKEUP_ID,
            },
            FifoPacket::Debug { .. } => DEBUG_ID,
            FifoPacket::Sensor(event) => event.raw_id(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            FifoPacket::Padding => 1,
            FifoPacket::Timestamp { .. } => 3,
            FifoPacket::Meta { .. } => 4,
            FifoPacket::Debug { .. } => 2 + DEBUG_DATA_LEN,
            FifoPacket::Sensor(event) => 1 + event.value.layout().payload_len(),
        }
    }

    /// Append the packet's FIFO framing to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.raw_id());

        match self {
            FifoPacket::Padding => {}
            FifoPacket::Timestamp { value, .. } => out.extend_from_slice(&value.to_le_bytes()),
            FifoPacket::Meta { event, .. } => {
                out.extend_from_slice(&[event.event_type, event.sensor, event.value])
            }
            FifoPacket::Debug { flags, data } => {
                out.push(*flags);
                out.extend_from_slice(data);
            }
            FifoPacket::Sensor(event) => event.value.write(out),
        }
    }
}
