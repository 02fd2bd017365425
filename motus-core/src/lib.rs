pub mod protocol;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use protocol::{
    BhyDecoder, Decoded, FifoPacket, MetaEvent, MetaEventType, PacketDecoder, ParseResult,
    ProtocolError, SensorEvent, SensorType, SensorValue, TimestampHalf,
};

/// Bits of a FIFO sensor id that carry its identity. The remaining bits are flags.
pub const SENSOR_ID_MASK: u8 = 0x1F;

/// Flag bit set on ids reported through the wake-up FIFO.
pub const WAKEUP_FLAG: u8 = 0x20;

/// FIFO a virtual sensor reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeMode {
    /// Events are buffered until the host drains the FIFO.
    NonWakeup,
    /// Events raise the host interrupt as soon as they are queued.
    Wakeup,
}

impl WakeMode {
    /// Mode encoded in a raw sensor id.
    pub const fn of_raw(raw: u8) -> Self {
        if raw & WAKEUP_FLAG != 0 {
            WakeMode::Wakeup
        } else {
            WakeMode::NonWakeup
        }
    }

    pub const fn index(self) -> usize {
        match self {
            WakeMode::NonWakeup => 0,
            WakeMode::Wakeup => 1,
        }
    }

    const fn flag(self) -> u8 {
        match self {
            WakeMode::NonWakeup => 0,
            WakeMode::Wakeup => WAKEUP_FLAG,
        }
    }
}

impl fmt::Display for WakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeMode::NonWakeup => f.write_str("non-wakeup"),
            WakeMode::Wakeup => f.write_str("wakeup"),
        }
    }
}

/// Identity of a virtual sensor, with the flag bits masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorId(u8);

impl SensorId {
    pub const fn new(raw: u8) -> Self {
        SensorId(raw & SENSOR_ID_MASK)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Id as it appears in the FIFO for the given mode.
    pub const fn raw(self, mode: WakeMode) -> u8 {
        self.0 | mode.flag()
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-shot gesture sensors reported on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gesture {
    Glance,
    Pickup,
    SignificantMotion,
}

impl Gesture {
    pub const ALL: [Gesture; 3] = [Gesture::Glance, Gesture::Pickup, Gesture::SignificantMotion];

    pub const fn sensor_type(self) -> SensorType {
        match self {
            Gesture::Glance => SensorType::Glance,
            Gesture::Pickup => SensorType::Pickup,
            Gesture::SignificantMotion => SensorType::SignificantMotion,
        }
    }

    pub const fn sensor_id(self) -> SensorId {
        SensorId::new(self.sensor_type() as u8)
    }

    pub fn from_sensor_id(id: SensorId) -> Option<Self> {
        Gesture::ALL.into_iter().find(|g| g.sensor_id() == id)
    }

    /// Console label, at most ten characters.
    pub const fn label(self) -> &'static str {
        match self {
            Gesture::Glance => "Glance",
            Gesture::Pickup => "Pickup",
            Gesture::SignificantMotion => "Sig motion",
        }
    }
}

/// When the coprocessor flushes a sensor's buffered samples after arming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    #[default]
    None,
    Single,
    All,
}

/// Parameters a virtual sensor is armed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub sample_rate_hz: u16,
    pub max_report_latency_ms: u16,
    pub flush: FlushPolicy,
    pub change_sensitivity: u16,
    pub dynamic_range: u16,
}

impl Default for ArmConfig {
    fn default() -> Self {
        // Gesture sensors fire at most once per arm, so the rate is nominal.
        Self {
            sample_rate_hz: 1,
            max_report_latency_ms: 0,
            flush: FlushPolicy::None,
            change_sensitivity: 0,
            dynamic_range: 0,
        }
    }
}

/// An "enable virtual sensor" command for the coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmRequest {
    pub sensor: SensorId,
    pub mode: WakeMode,
    pub config: ArmConfig,
}
