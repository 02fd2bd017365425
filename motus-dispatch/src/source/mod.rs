pub mod replay;
pub mod sim;

use async_trait::async_trait;

/// What the host interrupt line reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The coprocessor has queued FIFO data.
    Ready,
    /// No more data will ever arrive.
    Closed,
}

/// The host interrupt raised by the coprocessor when its FIFO has data.
///
/// The control loop only waits here once the previous read reported nothing
/// pending, so implementations can assume the FIFO was drained.
#[async_trait(?Send)]
pub trait InterruptLine {
    async fn wait_ready(&mut self) -> Signal;
}
