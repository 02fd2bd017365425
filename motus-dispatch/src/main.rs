use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use motus_core::ArmRequest;
use motus_dispatch::console::spawn_stdio_echo;
use motus_dispatch::{Config, ReplaySource, RunSummary, SimConfig, SimDevice, SourceConfig, monitor};
use motus_edge::LineSink;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "motus-dispatch")]
#[command(about = "Gesture monitor for a sensor-fusion coprocessor")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "motus-dispatch.toml")]
    config: PathBuf,

    /// Stop after this many simulated gestures
    #[arg(long)]
    max_gestures: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "motus_dispatch=info,motus_edge=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    if let Some(limit) = cli.max_gestures {
        config.limit_gestures(limit);
    }

    info!(
        capacity = config.fifo.capacity,
        page_size = config.fifo.page_size,
        gestures = config.gestures.len(),
        bus_clock_hz = config.bus.clock_hz,
        "Starting motus-dispatch"
    );

    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            cancel_for_signal.cancel();
        }
    });

    if config.console.echo {
        spawn_stdio_echo(cancel.clone());
    }

    let sink = LineSink::new(std::io::stdout());

    let summary = match &config.source {
        SourceConfig::Simulated {
            seed,
            tick_interval_ms,
            gesture_probability,
            sample_rate_hz,
            max_gestures,
        } => {
            info!(?seed, tick_interval_ms, gesture_probability, "Using simulated coprocessor");

            let mut device = SimDevice::open(
                config.bus.clock_hz,
                SimConfig {
                    seed: *seed,
                    tick_interval: Duration::from_millis(*tick_interval_ms),
                    gesture_probability: *gesture_probability,
                    sample_rate_hz: *sample_rate_hz,
                    max_gestures: *max_gestures,
                    page_size: config.fifo.page_size,
                    ticks_per_second: config.clock.ticks_per_second,
                },
            )?;

            let coprocessor = device.clone();
            let (summary, ..) = monitor(&config, &mut device, coprocessor, sink, &cancel).await?;
            summary
        }
        SourceConfig::Replay { path, chunk_sizes } => {
            info!(path = ?path, ?chunk_sizes, "Replaying recorded FIFO dump");

            let mut replay = ReplaySource::load(path, chunk_sizes).await?;
            let (summary, arms, _) =
                monitor(&config, &mut replay, Vec::<ArmRequest>::new(), sink, &cancel).await?;
            info!(arm_requests = arms.len(), "Arm requests recorded during replay");
            summary
        }
    };

    log_summary(&summary);
    cancel.cancel();

    info!("motus-dispatch shut down complete");
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    let RunSummary {
        cycles,
        armed,
        fifo,
        dispatch,
        leftover,
    } = summary;

    info!(
        cycles,
        armed,
        leftover,
        bytes = fifo.bytes_received,
        packets = fifo.packets_decoded,
        decode_failures = fifo.decode_failures,
        skipped = fifo.bytes_skipped,
        max_carry = fifo.max_carry,
        "FIFO totals"
    );
    info!(
        reports = dispatch.reports,
        rearms = dispatch.rearms,
        timestamps = dispatch.timestamps,
        unknown_gestures = dispatch.unknown_gestures,
        samples = dispatch.samples,
        unhandled = dispatch.unhandled,
        meta_events = dispatch.meta_events,
        fifo_overflows = dispatch.fifo_overflows,
        "Dispatch totals"
    );
}
