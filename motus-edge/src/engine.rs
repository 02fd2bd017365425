use motus_core::protocol::{MAX_PACKET_LENGTH, PacketDecoder};
use motus_core::{BhyDecoder, ProtocolError};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Error;
use crate::dispatch::PacketHandler;
use crate::transport::TransferSource;

/// Transfer buffer geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FifoConfig {
    pub capacity: usize,
    /// Largest chunk the coprocessor streams per read.
    pub page_size: usize,
    pub max_packet_len: usize,
}

impl FifoConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_packet_len < MAX_PACKET_LENGTH {
            return Err(Error::PacketLimitTooSmall {
                max_packet_len: self.max_packet_len,
                longest: MAX_PACKET_LENGTH,
            });
        }
        if self.capacity < self.page_size + self.max_packet_len + 1 {
            return Err(Error::BufferTooSmall {
                capacity: self.capacity,
                page_size: self.page_size,
                max_packet_len: self.max_packet_len,
            });
        }
        Ok(())
    }
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            capacity: 69,
            page_size: 50,
            max_packet_len: MAX_PACKET_LENGTH,
        }
    }
}

/// Summary of one `ingest` cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Fresh bytes written by the source.
    pub received: usize,
    pub decoded: usize,
    pub consumed: usize,
    /// Bytes dropped because no packet starts with them.
    pub skipped: usize,
    /// Bytes moved to the front of the buffer for the next cycle.
    pub carry: usize,
    /// Bytes the source still has queued.
    pub pending: usize,
    /// First decode error of the cycle, if any.
    pub failure: Option<ProtocolError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FifoStats {
    pub ingests: u64,
    pub bytes_received: u64,
    pub packets_decoded: u64,
    pub decode_failures: u64,
    pub bytes_skipped: u64,
    pub max_carry: usize,
}

/// Owns the transfer buffer and turns arbitrarily chunked FIFO reads into whole packets.
pub struct Reassembler<D = BhyDecoder> {
    buf: Box<[u8]>,
    carry: usize,
    max_packet_len: usize,
    decoder: D,
    stats: FifoStats,
}

impl<D: PacketDecoder> Reassembler<D> {
    pub fn new(config: FifoConfig, decoder: D) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            buf: vec![0u8; config.capacity].into_boxed_slice(),
            carry: 0,
            max_packet_len: config.max_packet_len,
            decoder,
            stats: FifoStats::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Undecoded bytes held over from the previous cycle.
    pub fn carry(&self) -> &[u8] {
        &self.buf[..self.carry]
    }

    pub fn stats(&self) -> FifoStats {
        self.stats
    }

    /// Read once from `source` and decode every packet that is safe to decode.
    ///
    /// Fresh bytes land right after the carry region. While the source reports
    /// more bytes pending, decoding stops as soon as `max_packet_len` or fewer
    /// bytes remain, since those may be the head of a packet whose tail has not
    /// been read yet. Once nothing is pending the buffer is drained completely.
    /// A byte that cannot start any packet is dropped and decoding resumes at
    /// the next one. Whatever is left is moved to the front of the buffer, even
    /// when the handler fails, in which case its error is returned afterwards.
    #[instrument(level = "trace", skip_all, fields(carry = self.carry))]
    pub fn ingest<S, H>(&mut self, source: &mut S, handler: &mut H) -> Result<IngestReport, Error>
    where
        S: TransferSource + ?Sized,
        H: PacketHandler + ?Sized,
    {
        let capacity = self.buf.len();
        if self.carry >= capacity {
            return Err(Error::Overflow {
                carry: self.carry,
                capacity,
            });
        }

        let region = &mut self.buf[self.carry..];
        let max = region.len();
        let transfer = source.fill(region)?;
        if transfer.written > max {
            return Err(Error::SourceOverrun {
                written: transfer.written,
                max,
            });
        }

        let occupied = self.carry + transfer.written;
        let threshold = if transfer.pending > 0 {
            self.max_packet_len
        } else {
            0
        };

        let mut cursor = 0;
        let mut decoded = 0;
        let mut skipped = 0;
        let mut failure = None;
        let mut handler_error = None;

        while occupied - cursor > threshold {
            let remaining = &self.buf[cursor..occupied];

            let packet = match self.decoder.decode(remaining) {
                Ok(d) if d.len == 0 || d.len > remaining.len() => {
                    failure.get_or_insert(ProtocolError::InvalidLength {
                        len: d.len,
                        available: remaining.len(),
                    });
                    break;
                }
                Ok(d) => {
                    cursor += d.len;
                    d.packet
                }
                Err(e) if e.is_unknown_id() => {
                    cursor += 1;
                    skipped += 1;
                    failure.get_or_insert(e);
                    continue;
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    break;
                }
            };

            decoded += 1;
            if let Err(e) = handler.handle(&packet) {
                handler_error = Some(e);
                break;
            }
        }

        let carry = occupied - cursor;
        self.buf.copy_within(cursor..occupied, 0);
        self.carry = carry;

        self.stats.ingests += 1;
        self.stats.bytes_received += transfer.written as u64;
        self.stats.packets_decoded += decoded as u64;
        self.stats.bytes_skipped += skipped as u64;
        self.stats.max_carry = self.stats.max_carry.max(carry);

        if let Some(e) = &failure {
            self.stats.decode_failures += 1;
            warn!(error = %e, offset = cursor, skipped, carry, "FIFO decode error");
        }

        if let Some(e) = handler_error {
            return Err(e);
        }

        debug!(
            received = transfer.written,
            decoded,
            carry,
            pending = transfer.pending,
            "FIFO ingest complete"
        );

        Ok(IngestReport {
            received: transfer.written,
            decoded,
            consumed: cursor,
            skipped,
            carry,
            pending: transfer.pending,
            failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use motus_core::{
        Decoded, FifoPacket, ParseResult, SensorEvent, SensorType, SensorValue, WakeMode,
    };

    use super::*;
    use crate::transport::{BusError, Transfer};

    /// Hands out pre-recorded reads, each with an explicit pending count.
    struct ScriptedSource {
        reads: VecDeque<(Vec<u8>, usize)>,
    }

    impl ScriptedSource {
        fn new(reads: impl IntoIterator<Item = (Vec<u8>, usize)>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
            }
        }
    }

    impl TransferSource for ScriptedSource {
        fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError> {
            let (bytes, pending) = self.reads.pop_front().unwrap_or_default();
            assert!(bytes.len() <= region.len(), "script overruns the region");
            region[..bytes.len()].copy_from_slice(&bytes);
            Ok(Transfer {
                written: bytes.len(),
                pending,
            })
        }
    }

    /// Hands out at most `page` bytes per read and reports the rest as pending.
    struct PagedSource {
        data: VecDeque<u8>,
        page: usize,
    }

    impl TransferSource for PagedSource {
        fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError> {
            let n = region.len().min(self.page).min(self.data.len());
            for (dst, byte) in region.iter_mut().zip(self.data.drain(..n)) {
                *dst = byte;
            }
            Ok(Transfer {
                written: n,
                pending: self.data.len(),
            })
        }
    }

    fn encode(packets: &[FifoPacket]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in packets {
            p.encode(&mut out);
        }
        out
    }

    fn accel(x: i16) -> FifoPacket {
        FifoPacket::Sensor(
            SensorEvent::new(
                SensorType::Accelerometer,
                WakeMode::NonWakeup,
                SensorValue::Vector { x, y: 0, z: 0, status: 3 },
            )
            .unwrap(),
        )
    }

    fn rotation(w: i16) -> FifoPacket {
        FifoPacket::Sensor(
            SensorEvent::new(
                SensorType::RotationVector,
                WakeMode::NonWakeup,
                SensorValue::Quaternion {
                    x: 0,
                    y: 0,
                    z: 0,
                    w,
                    accuracy: 0,
                },
            )
            .unwrap(),
        )
    }

    fn debug_packet() -> FifoPacket {
        FifoPacket::Debug {
            flags: 1,
            data: [0xAB; 16],
        }
    }

    fn collect(into: &mut Vec<FifoPacket>) -> impl FnMut(&FifoPacket) -> Result<(), Error> + '_ {
        move |p| {
            into.push(*p);
            Ok(())
        }
    }

    fn ignore(_: &FifoPacket) -> Result<(), Error> {
        Ok(())
    }

    #[test]
    fn partial_tail_is_carried_into_the_next_transfer() {
        let head = [accel(1), accel(2), rotation(3), rotation(4)];
        let tail = debug_packet();
        let tail_bytes = encode(&[tail]);

        let mut first = encode(&head);
        assert_eq!(first.len(), 38);
        first.extend_from_slice(&tail_bytes[..12]);

        let mut source = ScriptedSource::new([(first, 1), (tail_bytes[12..].to_vec(), 0)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let mut packets = Vec::new();

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.received, 50);
        assert_eq!(report.decoded, 4);
        assert_eq!(report.carry, 12);
        assert_eq!(report.failure, None);
        assert_eq!(reassembler.carry(), &tail_bytes[..12]);

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.received, 6);
        assert_eq!(report.decoded, 1);
        assert_eq!(report.carry, 0);

        assert_eq!(packets, [head.as_slice(), &[tail]].concat());
    }

    #[test]
    fn conservative_drain_keeps_a_max_length_packet_at_the_boundary() {
        let bytes = encode(&[accel(1), debug_packet()]);
        assert_eq!(bytes.len(), 8 + MAX_PACKET_LENGTH);

        let mut source = ScriptedSource::new([(bytes, 5), (Vec::new(), 0)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let mut packets = Vec::new();

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.decoded, 1);
        assert_eq!(report.carry, MAX_PACKET_LENGTH);

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.decoded, 1);
        assert_eq!(report.carry, 0);
        assert_eq!(packets, [accel(1), debug_packet()]);
    }

    #[test]
    fn conservative_drain_stops_at_or_below_max_packet_len() {
        // 19 bytes remain after the first packet, so exactly one more decode is allowed.
        let bytes = encode(&[
            accel(1),
            accel(2),
            accel(3),
            FifoPacket::Padding,
            FifoPacket::Padding,
            FifoPacket::Padding,
        ]);
        assert_eq!(bytes.len(), 27);

        let mut source = ScriptedSource::new([(bytes, 1)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let mut packets = Vec::new();

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.decoded, 2);
        assert_eq!(report.carry, 11);
        assert_eq!(packets, [accel(1), accel(2)]);
    }

    #[test]
    fn exhaustive_drain_when_nothing_is_pending() {
        let bytes = encode(&[accel(1), FifoPacket::Padding, accel(2)]);

        let mut source = ScriptedSource::new([(bytes, 0)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let mut packets = Vec::new();

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.decoded, 3);
        assert_eq!(report.carry, 0);
        assert_eq!(report.consumed, 17);
    }

    #[test]
    fn unknown_id_is_skipped_and_a_truncated_tail_is_kept() {
        let mut bytes = encode(&[accel(1)]);
        bytes.extend_from_slice(&[200, 1, 2]);

        let mut source = ScriptedSource::new([(bytes, 0)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let mut packets = Vec::new();

        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.decoded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failure, Some(ProtocolError::UnknownPacketId(200)));
        assert_eq!(reassembler.carry(), &[1, 2]);
        assert_eq!(reassembler.stats().decode_failures, 1);
        assert_eq!(reassembler.stats().bytes_skipped, 1);
        assert_eq!(packets, [accel(1)]);
    }

    #[test]
    fn stream_recovers_after_a_stray_byte() {
        let mut bytes = vec![200];
        for i in 0..30 {
            accel(i).encode(&mut bytes);
        }
        bytes.extend_from_slice(&[0; 40]);

        let mut source = PagedSource {
            data: bytes.into(),
            page: 50,
        };
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let mut packets = Vec::new();

        loop {
            let report = reassembler
                .ingest(&mut source, &mut collect(&mut packets))
                .unwrap();
            if report.pending == 0 {
                break;
            }
        }

        let expected: Vec<_> = (0..30)
            .map(accel)
            .chain(std::iter::repeat_n(FifoPacket::Padding, 40))
            .collect();
        assert_eq!(packets, expected);
        assert!(reassembler.carry().is_empty());

        let stats = reassembler.stats();
        assert_eq!(stats.bytes_skipped, 1);
        assert_eq!(stats.decode_failures, 1);
        assert!(stats.max_carry <= MAX_PACKET_LENGTH);
    }

    #[test]
    fn handler_error_keeps_the_unconsumed_bytes() {
        let mut source = ScriptedSource::new([(vec![0; 10], 0)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();

        let mut calls = 0;
        let mut failing = |_: &FifoPacket| {
            calls += 1;
            if calls == 3 {
                Err(Error::Output(std::io::Error::other("sink closed")))
            } else {
                Ok(())
            }
        };
        let err = reassembler.ingest(&mut source, &mut failing).unwrap_err();
        assert!(matches!(err, Error::Output(_)));

        assert_eq!(reassembler.carry(), &[0; 7]);
        let stats = reassembler.stats();
        assert_eq!(stats.bytes_received, 10);
        assert_eq!(stats.packets_decoded, 3);

        let mut packets = Vec::new();
        let report = reassembler
            .ingest(&mut source, &mut collect(&mut packets))
            .unwrap();
        assert_eq!(report.received, 0);
        assert_eq!(report.decoded, 7);
        assert_eq!(report.carry, 0);
        assert_eq!(reassembler.stats().packets_decoded, 10);
    }

    #[test]
    fn full_undecodable_carry_is_fatal() {
        struct NeverComplete;

        impl PacketDecoder for NeverComplete {
            fn decode(&self, bytes: &[u8]) -> ParseResult<Decoded> {
                Err(ProtocolError::Truncated {
                    needed: 64,
                    available: bytes.len(),
                })
            }
        }

        let config = FifoConfig {
            capacity: 20,
            page_size: 1,
            max_packet_len: MAX_PACKET_LENGTH,
        };
        let mut source = ScriptedSource::new([(vec![1; 20], 1)]);
        let mut reassembler = Reassembler::new(config, NeverComplete).unwrap();

        let report = reassembler.ingest(&mut source, &mut ignore).unwrap();
        assert_eq!(report.carry, 20);

        let err = reassembler.ingest(&mut source, &mut ignore).unwrap_err();
        assert!(matches!(
            err,
            Error::Overflow {
                carry: 20,
                capacity: 20
            }
        ));
    }

    #[test]
    fn source_claiming_more_than_the_region_is_rejected() {
        struct Liar;

        impl TransferSource for Liar {
            fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError> {
                Ok(Transfer {
                    written: region.len() + 1,
                    pending: 0,
                })
            }
        }

        let mut reassembler = Reassembler::new(FifoConfig::default(), BhyDecoder).unwrap();
        let err = reassembler
            .ingest(&mut Liar, &mut ignore)
            .unwrap_err();
        assert!(matches!(err, Error::SourceOverrun { written: 70, max: 69 }));
    }

    #[test]
    fn zero_length_decode_is_treated_as_failure() {
        struct Stuck;

        impl PacketDecoder for Stuck {
            fn decode(&self, _: &[u8]) -> ParseResult<Decoded> {
                Ok(Decoded {
                    packet: FifoPacket::Padding,
                    len: 0,
                })
            }
        }

        let mut source = ScriptedSource::new([(vec![0; 4], 0)]);
        let mut reassembler = Reassembler::new(FifoConfig::default(), Stuck).unwrap();
        let report = reassembler
            .ingest(&mut source, &mut ignore)
            .unwrap();

        assert_eq!(report.decoded, 0);
        assert_eq!(
            report.failure,
            Some(ProtocolError::InvalidLength {
                len: 0,
                available: 4
            })
        );
        assert_eq!(report.carry, 4);
    }

    #[test]
    fn undersized_buffer_is_rejected() {
        let config = FifoConfig {
            capacity: 68,
            ..FifoConfig::default()
        };
        assert!(matches!(
            Reassembler::new(config, BhyDecoder),
            Err(Error::BufferTooSmall { capacity: 68, .. })
        ));
    }

    #[test]
    fn packet_limit_below_the_longest_packet_is_rejected() {
        let config = FifoConfig {
            max_packet_len: 10,
            ..FifoConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::PacketLimitTooSmall {
                max_packet_len: 10,
                longest: MAX_PACKET_LENGTH
            })
        ));
    }
}
