use super::SensorType;

pub type ParseResult<T> = core::result::Result<T, ProtocolError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty buffer")]
    Empty,
    #[error("unknown packet id {0:#04x}")]
    UnknownPacketId(u8),
    #[error("invalid sensor type {0}")]
    InvalidSensorType(u8),
    #[error("truncated packet: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("value does not match the {0:?} sample layout")]
    LayoutMismatch(SensorType),
    #[error("decoder reported {len} bytes consumed out of {available}")]
    InvalidLength { len: usize, available: usize },
}

impl ProtocolError {
    /// The leading byte cannot start any packet, so no amount of further
    /// data will make it decode.
    pub fn is_unknown_id(&self) -> bool {
        matches!(self, Self::UnknownPacketId(_) | Self::InvalidSensorType(_))
    }
}
