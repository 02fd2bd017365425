use std::path::{Path, PathBuf};

use motus_core::protocol::TICKS_PER_SECOND;
use motus_core::{ArmConfig, Gesture, SensorId, WakeMode};
use motus_edge::{FifoConfig, SensorHandler, SensorRegistry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fifo: FifoConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub bus: BusConfig,
    /// Gesture sensors armed at startup and re-armed after every event
    #[serde(default = "default_gestures")]
    pub gestures: Vec<GestureConfig>,
    /// Non-gesture sensors whose samples are traced
    #[serde(default)]
    pub samples: Vec<SampleConfig>,
    pub source: SourceConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Coprocessor timestamp ticks per second
    pub ticks_per_second: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: TICKS_PER_SECOND,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Two-wire bus clock in Hz
    pub clock_hz: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { clock_hz: 400_000 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GestureConfig {
    pub gesture: Gesture,
    #[serde(default = "default_wake_mode")]
    pub mode: WakeMode,
    #[serde(flatten)]
    pub arm: ArmConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SampleConfig {
    /// Virtual sensor id, flag bits are ignored
    pub sensor: u8,
    #[serde(default = "default_wake_mode")]
    pub mode: WakeMode,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Simulated {
        /// Fixed seed for reproducible runs
        #[serde(default)]
        seed: Option<u64>,
        /// Interval in milliseconds between simulated FIFO updates
        tick_interval_ms: u64,
        /// Chance that an armed gesture fires on a given tick
        gesture_probability: f64,
        /// Rate of the accelerometer samples queued between gestures
        #[serde(default)]
        sample_rate_hz: u16,
        /// Stop once this many gestures have fired
        #[serde(default)]
        max_gestures: Option<u64>,
    },
    Replay {
        /// Raw FIFO dump
        path: PathBuf,
        /// Read sizes cycled through while streaming the dump
        #[serde(default = "default_chunk_sizes")]
        chunk_sizes: Vec<usize>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Echo console input back to the output
    pub echo: bool,
}

fn default_gestures() -> Vec<GestureConfig> {
    Gesture::ALL
        .into_iter()
        .map(|gesture| GestureConfig {
            gesture,
            mode: WakeMode::Wakeup,
            arm: ArmConfig::default(),
        })
        .collect()
}

fn default_wake_mode() -> WakeMode {
    WakeMode::Wakeup
}

fn default_chunk_sizes() -> Vec<usize> {
    vec![50]
}

impl Config {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.fifo.validate()?;
        Ok(config)
    }

    /// Handler table for the configured sensors.
    ///
    /// Timestamps are tracked for every FIFO that has at least one handler.
    pub fn registry(&self) -> Result<SensorRegistry, motus_edge::Error> {
        let mut registry = SensorRegistry::new();

        for g in &self.gestures {
            registry.install_gesture(g.gesture, g.mode, g.arm)?;
        }
        for s in &self.samples {
            let id = SensorId::new(s.sensor);
            registry.install_sensor_handler(id, s.mode, SensorHandler::Sample)?;
        }

        let modes = self
            .gestures
            .iter()
            .map(|g| g.mode)
            .chain(self.samples.iter().map(|s| s.mode));
        for mode in modes {
            if !registry.handles_timestamps(mode) {
                registry.install_timestamp_handler(mode)?;
            }
        }

        Ok(registry)
    }

    /// Cap the number of simulated gestures. Has no effect on a replay source.
    pub fn limit_gestures(&mut self, limit: u64) {
        if let SourceConfig::Simulated { max_gestures, .. } = &mut self.source {
            *max_gestures = Some(limit);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fifo: FifoConfig::default(),
            clock: ClockConfig::default(),
            bus: BusConfig::default(),
            gestures: default_gestures(),
            samples: Vec::new(),
            source: SourceConfig::Simulated {
                seed: None,
                tick_interval_ms: 500,
                gesture_probability: 0.2,
                sample_rate_hz: 25,
                max_gestures: None,
            },
            console: ConsoleConfig::default(),
        }
    }
}
