pub mod dispatch;
pub mod engine;
pub mod sensor_registry;
pub mod timestamp;
pub mod transport;

pub use dispatch::{DispatchStats, Dispatcher, GestureReport, PacketHandler};
pub use engine::{FifoConfig, FifoStats, IngestReport, Reassembler};
pub use sensor_registry::{Category, HandlerKey, SensorHandler, SensorRegistry};
pub use timestamp::{Elapsed, TimestampTracker};
pub use transport::{BusError, Coprocessor, LineSink, ReportSink, Transfer, TransferSource};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "transfer buffer of {capacity} bytes cannot hold a {page_size}-byte page plus a {max_packet_len}-byte packet"
    )]
    BufferTooSmall {
        capacity: usize,
        page_size: usize,
        max_packet_len: usize,
    },

    #[error(
        "max packet length of {max_packet_len} bytes is below the {longest}-byte longest packet"
    )]
    PacketLimitTooSmall {
        max_packet_len: usize,
        longest: usize,
    },

    #[error("carry of {carry} bytes leaves no room in the {capacity}-byte transfer buffer")]
    Overflow { carry: usize, capacity: usize },

    #[error("transfer source wrote {written} bytes into a {max}-byte region")]
    SourceOverrun { written: usize, max: usize },

    #[error("a handler is already installed for {0}")]
    HandlerInstalled(HandlerKey),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("report output failed: {0}")]
    Output(#[from] std::io::Error),
}
