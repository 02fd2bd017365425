use std::fmt;

use motus_core::{
    ArmRequest, FifoPacket, Gesture, MetaEvent, MetaEventType, SensorEvent, SensorId,
    TimestampHalf, WakeMode,
};
use tracing::{debug, info, trace, warn};

use crate::Error;
use crate::sensor_registry::{SensorHandler, SensorRegistry};
use crate::timestamp::{Elapsed, TimestampTracker};
use crate::transport::{Coprocessor, ReportSink};

/// Receives each packet as soon as it is decoded.
pub trait PacketHandler {
    fn handle(&mut self, packet: &FifoPacket) -> Result<(), Error>;
}

impl<F> PacketHandler for F
where
    F: FnMut(&FifoPacket) -> Result<(), Error>,
{
    fn handle(&mut self, packet: &FifoPacket) -> Result<(), Error> {
        self(packet)
    }
}

/// One console line: when a gesture fired and which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureReport {
    pub elapsed: Elapsed,
    pub sensor: SensorId,
    pub gesture: Option<Gesture>,
}

impl GestureReport {
    pub fn label(&self) -> &'static str {
        self.gesture.map_or("Unknown", Gesture::label)
    }
}

impl fmt::Display for GestureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time={}s Gesture: {}", self.elapsed, self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub timestamps: u64,
    pub reports: u64,
    pub rearms: u64,
    pub unknown_gestures: u64,
    pub samples: u64,
    pub unhandled: u64,
    pub meta_events: u64,
    pub fifo_overflows: u64,
}

/// Routes decoded packets to the timestamp tracker and the installed sensor handlers.
pub struct Dispatcher<C, W> {
    registry: SensorRegistry,
    clock: TimestampTracker,
    coprocessor: C,
    sink: W,
    stats: DispatchStats,
}

impl<C: Coprocessor, W: ReportSink> Dispatcher<C, W> {
    pub fn new(registry: SensorRegistry, clock: TimestampTracker, coprocessor: C, sink: W) -> Self {
        Self {
            registry,
            clock,
            coprocessor,
            sink,
            stats: DispatchStats::default(),
        }
    }

    /// Arm every installed gesture sensor. Called once before the FIFO loop starts.
    pub fn arm_all(&mut self) -> Result<usize, Error> {
        let requests: Vec<ArmRequest> = self.registry.gestures().collect();

        for request in &requests {
            info!(sensor = %request.sensor, mode = %request.mode, "Arming gesture sensor");
            self.coprocessor.arm(request)?;
        }

        Ok(requests.len())
    }

    pub fn clock(&self) -> &TimestampTracker {
        &self.clock
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn coprocessor(&self) -> &C {
        &self.coprocessor
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_parts(self) -> (C, W) {
        (self.coprocessor, self.sink)
    }

    fn on_timestamp(&mut self, half: TimestampHalf, mode: WakeMode, value: u16) {
        if !self.registry.handles_timestamps(mode) {
            self.stats.unhandled += 1;
            return;
        }

        let ticks = self.clock.apply(half, value);
        self.stats.timestamps += 1;
        trace!(ticks, "Timestamp updated");
    }

    fn on_sensor_event(&mut self, event: &SensorEvent) -> Result<(), Error> {
        let sensor = event.id();

        let Some(handler) = self.registry.sensor_handler(sensor, event.mode) else {
            self.stats.unhandled += 1;
            trace!(%sensor, mode = %event.mode, "No handler installed");
            return Ok(());
        };

        match handler {
            SensorHandler::Sample => {
                self.stats.samples += 1;
                debug!(%sensor, value = ?event.value, "Sensor sample");
            }
            SensorHandler::Gesture(config) => {
                // One-shot sensors disarm themselves when they fire.
                self.coprocessor.arm(&ArmRequest {
                    sensor,
                    mode: event.mode,
                    config,
                })?;
                self.stats.rearms += 1;

                let gesture = Gesture::from_sensor_id(sensor);
                if gesture.is_none() {
                    self.stats.unknown_gestures += 1;
                    debug!(%sensor, "Gesture handler fired for an unlabelled sensor");
                }

                let report = GestureReport {
                    elapsed: self.clock.elapsed(),
                    sensor,
                    gesture,
                };
                self.sink.emit(&report)?;
                self.stats.reports += 1;
                debug!(%report, "Gesture reported");
            }
        }

        Ok(())
    }

    fn on_meta_event(&mut self, mode: WakeMode, event: &MetaEvent) {
        self.stats.meta_events += 1;

        match event.kind() {
            Some(MetaEventType::FifoOverflow) => {
                self.stats.fifo_overflows += 1;
                warn!(%mode, "Coprocessor FIFO overflowed, events were lost");
            }
            Some(kind) => debug!(?kind, sensor = event.sensor, value = event.value, "Meta event"),
            None => debug!(event_type = event.event_type, "Unrecognised meta event"),
        }
    }
}

impl<C: Coprocessor, W: ReportSink> PacketHandler for Dispatcher<C, W> {
    fn handle(&mut self, packet: &FifoPacket) -> Result<(), Error> {
        match packet {
            FifoPacket::Padding => {}
            FifoPacket::Timestamp { half, mode, value } => self.on_timestamp(*half, *mode, *value),
            FifoPacket::Meta { mode, event } => self.on_meta_event(*mode, event),
            FifoPacket::Debug { flags, data } => trace!(flags, ?data, "Debug packet"),
            FifoPacket::Sensor(event) => self.on_sensor_event(event)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use motus_core::{ArmConfig, SensorType, SensorValue};

    use super::*;

    fn dispatcher() -> Dispatcher<Vec<ArmRequest>, Vec<GestureReport>> {
        let mut registry = SensorRegistry::new();
        registry.install_timestamp_handler(WakeMode::Wakeup).unwrap();
        for gesture in Gesture::ALL {
            registry
                .install_gesture(gesture, WakeMode::Wakeup, ArmConfig::default())
                .unwrap();
        }
        registry
            .install_sensor_handler(
                SensorId::new(SensorType::TiltDetector as u8),
                WakeMode::Wakeup,
                SensorHandler::Gesture(ArmConfig::default()),
            )
            .unwrap();

        let clock = TimestampTracker::new(NonZeroU32::new(3_200_000).unwrap());
        Dispatcher::new(registry, clock, Vec::new(), Vec::new())
    }

    fn event(sensor_type: SensorType, mode: WakeMode) -> FifoPacket {
        FifoPacket::Sensor(SensorEvent::new(sensor_type, mode, SensorValue::U8(1)).unwrap())
    }

    #[test]
    fn gesture_rearms_once_and_reports() {
        let mut d = dispatcher();
        for p in FifoPacket::timestamp_pair(3_200_000, WakeMode::Wakeup) {
            d.handle(&p).unwrap();
        }
        d.handle(&event(SensorType::Pickup, WakeMode::Wakeup)).unwrap();

        assert_eq!(
            d.coprocessor(),
            &[ArmRequest {
                sensor: Gesture::Pickup.sensor_id(),
                mode: WakeMode::Wakeup,
                config: ArmConfig::default(),
            }]
        );
        assert_eq!(d.sink().len(), 1);
        assert_eq!(d.sink()[0].to_string(), "Time=001.000s Gesture: Pickup");

        let stats = d.stats();
        assert_eq!(stats.timestamps, 2);
        assert_eq!(stats.rearms, 1);
        assert_eq!(stats.reports, 1);
    }

    #[test]
    fn repeated_events_are_not_deduplicated() {
        let mut d = dispatcher();
        d.handle(&event(SensorType::Glance, WakeMode::Wakeup)).unwrap();
        d.handle(&event(SensorType::Glance, WakeMode::Wakeup)).unwrap();

        assert_eq!(d.coprocessor().len(), 2);
        assert_eq!(d.sink().len(), 2);
    }

    #[test]
    fn unlabelled_gesture_is_reported_as_unknown_and_rearmed() {
        let mut d = dispatcher();
        d.handle(&event(SensorType::TiltDetector, WakeMode::Wakeup)).unwrap();

        assert_eq!(d.coprocessor().len(), 1);
        assert_eq!(d.sink()[0].label(), "Unknown");
        assert_eq!(d.stats().unknown_gestures, 1);
    }

    #[test]
    fn events_without_handler_are_counted_not_dispatched() {
        let mut d = dispatcher();
        d.handle(&event(SensorType::Pickup, WakeMode::NonWakeup)).unwrap();
        d.handle(&FifoPacket::timestamp_pair(5, WakeMode::NonWakeup)[1]).unwrap();

        assert!(d.coprocessor().is_empty());
        assert!(d.sink().is_empty());
        assert_eq!(d.clock().ticks(), 0);
        assert_eq!(d.stats().unhandled, 2);
    }

    #[test]
    fn report_uses_latest_timestamp() {
        let mut d = dispatcher();
        for ticks in [1_600_000u32, 3_200_000, 4_800_000] {
            for p in FifoPacket::timestamp_pair(ticks, WakeMode::Wakeup) {
                d.handle(&p).unwrap();
            }
        }
        d.handle(&event(SensorType::SignificantMotion, WakeMode::Wakeup))
            .unwrap();

        assert_eq!(d.sink()[0].to_string(), "Time=001.500s Gesture: Sig motion");
    }

    #[test]
    fn arm_all_arms_each_gesture() {
        let mut d = dispatcher();
        assert_eq!(d.arm_all().unwrap(), 4);
        assert_eq!(d.coprocessor().len(), 4);
    }

    #[test]
    fn fifo_overflow_meta_event_is_counted() {
        let mut d = dispatcher();
        d.handle(&FifoPacket::Meta {
            mode: WakeMode::Wakeup,
            event: MetaEvent {
                event_type: MetaEventType::FifoOverflow as u8,
                sensor: 0,
                value: 0,
            },
        })
        .unwrap();

        assert_eq!(d.stats().meta_events, 1);
        assert_eq!(d.stats().fifo_overflows, 1);
    }
}
