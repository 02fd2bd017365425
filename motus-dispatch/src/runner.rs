use std::num::NonZeroU32;

use motus_core::BhyDecoder;
use motus_edge::{
    Coprocessor, DispatchStats, Dispatcher, FifoStats, Reassembler, ReportSink, TimestampTracker,
    TransferSource,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::source::{InterruptLine, Signal};
use crate::RunError;

/// Counters gathered over one monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub armed: usize,
    pub fifo: FifoStats,
    pub dispatch: DispatchStats,
    /// Bytes left undecoded when the loop stopped
    pub leftover: usize,
}

/// Drain the FIFO whenever the interrupt fires until the device closes or `cancel` fires.
///
/// While the previous read reported bytes still pending, the next read is
/// issued straight away. The interrupt is only awaited once the FIFO is empty.
#[instrument(level = "info", skip_all)]
pub async fn run<D, C, W>(
    device: &mut D,
    reassembler: &mut Reassembler,
    dispatcher: &mut Dispatcher<C, W>,
    cancel: &CancellationToken,
) -> Result<u64, RunError>
where
    D: TransferSource + InterruptLine + ?Sized,
    C: Coprocessor,
    W: ReportSink,
{
    let mut pending = 0;
    let mut cycles = 0u64;

    loop {
        if pending == 0 {
            let signal = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("FIFO loop cancelled");
                    break;
                }
                signal = device.wait_ready() => signal,
            };

            if signal == Signal::Closed {
                info!("Transfer source closed");
                break;
            }
        } else {
            // Back-to-back reads never suspend on their own.
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                info!(pending, "FIFO loop cancelled with bytes pending");
                break;
            }
        }

        let report = reassembler.ingest(device, dispatcher)?;
        pending = report.pending;
        cycles += 1;
    }

    Ok(cycles)
}

/// Set up the handler table, arm every gesture and run the FIFO loop.
pub async fn monitor<D, C, W>(
    config: &Config,
    device: &mut D,
    coprocessor: C,
    sink: W,
    cancel: &CancellationToken,
) -> Result<(RunSummary, C, W), RunError>
where
    D: TransferSource + InterruptLine + ?Sized,
    C: Coprocessor,
    W: ReportSink,
{
    let ticks_per_second =
        NonZeroU32::new(config.clock.ticks_per_second).ok_or(RunError::ZeroTickRate)?;

    let registry = config.registry()?;
    let mut reassembler = Reassembler::new(config.fifo, BhyDecoder)?;
    let mut dispatcher = Dispatcher::new(
        registry,
        TimestampTracker::new(ticks_per_second),
        coprocessor,
        sink,
    );

    let armed = dispatcher.arm_all()?;
    info!(armed, capacity = reassembler.capacity(), "Gesture sensors armed");

    let cycles = run(device, &mut reassembler, &mut dispatcher, cancel).await?;

    let leftover = reassembler.carry().len();
    if leftover > 0 {
        warn!(leftover, "FIFO loop stopped with undecoded bytes");
    }

    let summary = RunSummary {
        cycles,
        armed,
        fifo: reassembler.stats(),
        dispatch: dispatcher.stats(),
        leftover,
    };
    let (coprocessor, sink) = dispatcher.into_parts();

    Ok((summary, coprocessor, sink))
}
