mod error;
mod packet;
mod sensor;

pub use error::{ParseResult, ProtocolError};
pub use packet::{
    Decoded, FifoPacket, MetaEvent, MetaEventType, SensorEvent, SensorValue, TimestampHalf,
};
pub use sensor::{Layout, SensorType};

pub const PADDING_ID: u8 = 0x00;
pub const TIMESTAMP_LSW_ID: u8 = 245;
pub const TIMESTAMP_MSW_ID: u8 = 246;
pub const META_EVENT_WAKEUP_ID: u8 = 248;
pub const DEBUG_ID: u8 = 250;
pub const TIMESTAMP_LSW_WAKEUP_ID: u8 = 251;
pub const TIMESTAMP_MSW_WAKEUP_ID: u8 = 252;
pub const META_EVENT_ID: u8 = 254;

/// Longest packet the coprocessor emits (the debug packet).
pub const MAX_PACKET_LENGTH: usize = 18;
pub const DEBUG_DATA_LEN: usize = 16;

/// Coprocessor clock rate used by timestamp packets.
pub const TICKS_PER_SECOND: u32 = 3_200_000;

/// Decodes one packet at a time from the front of a FIFO byte slice.
pub trait PacketDecoder {
    /// Decode exactly one packet from the start of `bytes`.
    ///
    /// On success the returned length is the number of bytes the packet
    /// occupies and is never zero.
    fn decode(&self, bytes: &[u8]) -> ParseResult<Decoded>;
}

/// Decoder for the coprocessor's FIFO framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BhyDecoder;

impl PacketDecoder for BhyDecoder {
    fn decode(&self, bytes: &[u8]) -> ParseResult<Decoded> {
        FifoPacket::decode(bytes)
    }
}
