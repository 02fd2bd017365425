use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use motus_core::{ArmRequest, FifoPacket, SensorEvent, SensorType, SensorValue, WakeMode};
use motus_edge::{BusError, Coprocessor, Transfer, TransferSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, trace};

use super::{InterruptLine, Signal};

/// Bus clock rates the coprocessor accepts.
pub const SUPPORTED_CLOCKS_HZ: [u32; 2] = [100_000, 400_000];

/// Chance of a padding byte trailing a tick's packets.
const PADDING_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: Option<u64>,
    pub tick_interval: Duration,
    pub gesture_probability: f64,
    /// Accelerometer samples queued per second of simulated time
    pub sample_rate_hz: u16,
    pub max_gestures: Option<u64>,
    /// Most bytes handed out per read
    pub page_size: usize,
    pub ticks_per_second: u32,
}

struct SimState {
    config: SimConfig,
    fifo: VecDeque<u8>,
    armed: Vec<ArmRequest>,
    ticks: u32,
    rng: StdRng,
    gestures_fired: u64,
    arm_calls: u64,
}

impl SimState {
    fn exhausted(&self) -> bool {
        self.fifo.is_empty()
            && self
                .config
                .max_gestures
                .is_some_and(|max| self.gestures_fired >= max)
    }

    fn push(&mut self, packet: &FifoPacket) {
        let mut bytes = Vec::with_capacity(packet.encoded_len());
        packet.encode(&mut bytes);
        self.fifo.extend(bytes);
    }

    fn tick(&mut self) {
        let interval_ms = self.config.tick_interval.as_millis() as u64;
        let step = u64::from(self.config.ticks_per_second) * interval_ms / 1000;
        self.ticks = self.ticks.wrapping_add(step as u32);

        let samples = u64::from(self.config.sample_rate_hz) * interval_ms / 1000;
        if samples > 0 {
            for p in FifoPacket::timestamp_pair(self.ticks, WakeMode::NonWakeup) {
                self.push(&p);
            }
            for _ in 0..samples {
                let value = SensorValue::Vector {
                    x: self.rng.random_range(-200..200),
                    y: self.rng.random_range(-200..200),
                    z: self.rng.random_range(3900..4300),
                    status: 3,
                };
                self.push(&FifoPacket::Sensor(SensorEvent {
                    sensor_type: SensorType::Accelerometer,
                    mode: WakeMode::NonWakeup,
                    value,
                }));
            }
        }

        let limit_reached = self
            .config
            .max_gestures
            .is_some_and(|max| self.gestures_fired >= max);
        if !limit_reached && self.rng.random_bool(self.config.gesture_probability) {
            self.fire_gesture();
        }

        if self.rng.random_bool(PADDING_PROBABILITY) {
            self.push(&FifoPacket::Padding);
        }
    }

    fn fire_gesture(&mut self) {
        let candidates: Vec<(usize, SensorType)> = self
            .armed
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                SensorType::try_from(r.sensor.get())
                    .ok()
                    .filter(|t| t.is_one_shot())
                    .map(|t| (i, t))
            })
            .collect();
        if candidates.is_empty() {
            return;
        }

        let (index, sensor_type) = candidates[self.rng.random_range(0..candidates.len())];
        // One-shot sensors disarm as they fire.
        let request = self.armed.swap_remove(index);

        let event = SensorEvent {
            sensor_type,
            mode: request.mode,
            value: SensorValue::U8(1),
        };

        for p in FifoPacket::timestamp_pair(self.ticks, request.mode) {
            self.push(&p);
        }
        self.push(&FifoPacket::Sensor(event));
        self.gestures_fired += 1;

        trace!(sensor = %request.sensor, ticks = self.ticks, "Simulated gesture fired");
    }
}

/// A simulated coprocessor behind a two-wire bus.
///
/// Clones share the same device, so one handle can feed the reassembler
/// while another takes arm commands from the dispatcher.
#[derive(Clone)]
pub struct SimDevice {
    state: Rc<RefCell<SimState>>,
}

impl SimDevice {
    pub fn open(clock_hz: u32, mut config: SimConfig) -> Result<Self, BusError> {
        if !SUPPORTED_CLOCKS_HZ.contains(&clock_hz) {
            return Err(BusError::UnsupportedClock(clock_hz));
        }

        config.gesture_probability = if config.gesture_probability.is_nan() {
            0.0
        } else {
            config.gesture_probability.clamp(0.0, 1.0)
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        info!(
            clock_hz,
            tick_interval_ms = config.tick_interval.as_millis() as u64,
            seed = ?config.seed,
            "Opened simulated coprocessor"
        );

        Ok(Self {
            state: Rc::new(RefCell::new(SimState {
                config,
                fifo: VecDeque::new(),
                armed: Vec::new(),
                ticks: 0,
                rng,
                gestures_fired: 0,
                arm_calls: 0,
            })),
        })
    }

    /// Advance simulated time by one tick interval without waiting.
    pub fn tick(&self) {
        self.state.borrow_mut().tick();
    }

    pub fn queued(&self) -> usize {
        self.state.borrow().fifo.len()
    }

    pub fn armed(&self) -> Vec<ArmRequest> {
        self.state.borrow().armed.clone()
    }

    pub fn gestures_fired(&self) -> u64 {
        self.state.borrow().gestures_fired
    }

    pub fn arm_calls(&self) -> u64 {
        self.state.borrow().arm_calls
    }
}

impl TransferSource for SimDevice {
    fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError> {
        let mut state = self.state.borrow_mut();

        let n = region
            .len()
            .min(state.config.page_size)
            .min(state.fifo.len());
        for (dst, byte) in region.iter_mut().zip(state.fifo.drain(..n)) {
            *dst = byte;
        }

        Ok(Transfer {
            written: n,
            pending: state.fifo.len(),
        })
    }
}

impl Coprocessor for SimDevice {
    fn arm(&mut self, request: &ArmRequest) -> Result<(), BusError> {
        let mut state = self.state.borrow_mut();
        state.arm_calls += 1;

        match state
            .armed
            .iter_mut()
            .find(|r| r.sensor == request.sensor && r.mode == request.mode)
        {
            Some(existing) => existing.config = request.config,
            None => state.armed.push(*request),
        }

        Ok(())
    }
}

#[async_trait(?Send)]
impl InterruptLine for SimDevice {
    async fn wait_ready(&mut self) -> Signal {
        loop {
            let interval = {
                let state = self.state.borrow();
                if state.exhausted() {
                    return Signal::Closed;
                }
                state.config.tick_interval
            };

            tokio::time::sleep(interval).await;

            let mut state = self.state.borrow_mut();
            state.tick();
            if !state.fifo.is_empty() {
                return Signal::Ready;
            }
        }
    }
}
