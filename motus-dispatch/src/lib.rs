pub mod config;
pub mod console;
pub mod runner;
pub mod source;

use std::path::PathBuf;

pub use config::{
    BusConfig, ClockConfig, Config, ConsoleConfig, GestureConfig, SampleConfig, SourceConfig,
};
pub use runner::{RunSummary, monitor, run};
pub use source::replay::ReplaySource;
pub use source::sim::{SimConfig, SimDevice};
pub use source::{InterruptLine, Signal};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Edge(#[from] motus_edge::Error),

    #[error("clock.ticks_per_second must be greater than zero")]
    ZeroTickRate,

    #[error("failed to read FIFO dump {path:?}: {source}")]
    Replay {
        path: PathBuf,
        source: std::io::Error,
    },
}
