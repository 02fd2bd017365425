use std::fmt;

use motus_core::{ArmConfig, ArmRequest, Gesture, SENSOR_ID_MASK, SensorId, WakeMode};

use crate::Error;

pub const MAX_SENSORS: usize = SENSOR_ID_MASK as usize + 1;

/// What to do with an event from a virtual sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorHandler {
    /// Report the event on the console and re-arm the sensor with this config.
    Gesture(ArmConfig),
    /// Trace the sample and move on.
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Timestamp,
    VirtualSensor(SensorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerKey {
    pub category: Category,
    pub mode: WakeMode,
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Category::Timestamp => write!(f, "{} timestamps", self.mode),
            Category::VirtualSensor(id) => write!(f, "{} sensor {id}", self.mode),
        }
    }
}

/// Handlers installed at startup, keyed by category, masked id and wake mode.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    timestamps: [bool; 2],
    sensors: [[Option<SensorHandler>; MAX_SENSORS]; 2],
}

impl SensorRegistry {
    pub const fn new() -> Self {
        Self {
            timestamps: [false; 2],
            sensors: [[None; MAX_SENSORS]; 2],
        }
    }

    fn register(&mut self, id: SensorId, mode: WakeMode, handler: SensorHandler) -> Option<()> {
        let slot = &mut self.sensors[mode.index()][id.get() as usize];
        if slot.is_some() {
            return None;
        }

        *slot = Some(handler);
        Some(())
    }

    pub fn install_sensor_handler(
        &mut self,
        id: SensorId,
        mode: WakeMode,
        handler: SensorHandler,
    ) -> Result<(), Error> {
        self.register(id, mode, handler)
            .ok_or(Error::HandlerInstalled(HandlerKey {
                category: Category::VirtualSensor(id),
                mode,
            }))
    }

    pub fn install_gesture(
        &mut self,
        gesture: Gesture,
        mode: WakeMode,
        config: ArmConfig,
    ) -> Result<(), Error> {
        self.install_sensor_handler(gesture.sensor_id(), mode, SensorHandler::Gesture(config))
    }

    pub fn install_timestamp_handler(&mut self, mode: WakeMode) -> Result<(), Error> {
        let slot = &mut self.timestamps[mode.index()];
        if *slot {
            return Err(Error::HandlerInstalled(HandlerKey {
                category: Category::Timestamp,
                mode,
            }));
        }

        *slot = true;
        Ok(())
    }

    pub fn handles_timestamps(&self, mode: WakeMode) -> bool {
        self.timestamps[mode.index()]
    }

    pub fn sensor_handler(&self, id: SensorId, mode: WakeMode) -> Option<SensorHandler> {
        self.sensors[mode.index()][id.get() as usize]
    }

    /// Arm requests for every installed gesture handler.
    pub fn gestures(&self) -> impl Iterator<Item = ArmRequest> + '_ {
        [WakeMode::NonWakeup, WakeMode::Wakeup]
            .into_iter()
            .flat_map(move |mode| {
                self.sensors[mode.index()]
                    .iter()
                    .enumerate()
                    .filter_map(move |(id, handler)| match handler {
                        Some(SensorHandler::Gesture(config)) => Some(ArmRequest {
                            sensor: SensorId::new(id as u8),
                            mode,
                            config: *config,
                        }),
                        _ => None,
                    })
            })
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
