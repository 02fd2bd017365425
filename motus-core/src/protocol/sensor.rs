use super::*;

/// Payload shape of a virtual sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// x, y, z as i16 plus a status byte.
    Vector,
    /// x, y, z, w as i16 plus an i16 accuracy estimate.
    Quaternion,
    /// Six i16 values (raw and bias) plus a status byte.
    Uncalibrated,
    ScalarU8,
    ScalarU16,
    ScalarI16,
    /// Unsigned 24-bit value.
    ScalarU24,
}

impl Layout {
    /// Payload length, excluding the id byte.
    pub const fn payload_len(self) -> usize {
        match self {
            Layout::Vector => 7,
            Layout::Quaternion => 10,
            Layout::Uncalibrated => 13,
            Layout::ScalarU8 => 1,
            Layout::ScalarU16 | Layout::ScalarI16 => 2,
            Layout::ScalarU24 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    Accelerometer = 1,
    Magnetometer = 2,
    Orientation = 3,
    Gyroscope = 4,
    Light = 5,
    Barometer = 6,
    Proximity = 8,
    Gravity = 9,
    LinearAcceleration = 10,
    RotationVector = 11,
    Humidity = 12,
    AmbientTemperature = 13,
    UncalibratedMagnetometer = 14,
    GameRotationVector = 15,
    UncalibratedGyroscope = 16,
    SignificantMotion = 17,
    StepDetector = 18,
    StepCounter = 19,
    GeomagneticRotationVector = 20,
    HeartRate = 21,
    TiltDetector = 22,
    WakeGesture = 23,
    Glance = 24,
    Pickup = 25,
    ActivityRecognition = 31,
}

impl SensorType {
    pub const fn layout(self) -> Layout {
        match self {
            SensorType::Accelerometer
            | SensorType::Magnetometer
            | SensorType::Orientation
            | SensorType::Gyroscope
            | SensorType::Gravity
            | SensorType::LinearAcceleration => Layout::Vector,
            SensorType::RotationVector
            | SensorType::GameRotationVector
            | SensorType::GeomagneticRotationVector => Layout::Quaternion,
            SensorType::UncalibratedMagnetometer | SensorType::UncalibratedGyroscope => {
                Layout::Uncalibrated
            }
            SensorType::Proximity
            | SensorType::Humidity
            | SensorType::SignificantMotion
            | SensorType::StepDetector
            | SensorType::HeartRate
            | SensorType::TiltDetector
            | SensorType::WakeGesture
            | SensorType::Glance
            | SensorType::Pickup => Layout::ScalarU8,
            SensorType::Light | SensorType::StepCounter | SensorType::ActivityRecognition => {
                Layout::ScalarU16
            }
            SensorType::AmbientTemperature => Layout::ScalarI16,
            SensorType::Barometer => Layout::ScalarU24,
        }
    }

    /// Length of a sample packet, including the id byte.
    pub const fn packet_len(self) -> usize {
        1 + self.layout().payload_len()
    }

    /// One-shot sensors disarm themselves after reporting a single event.
    pub const fn is_one_shot(self) -> bool {
        matches!(
            self,
            SensorType::SignificantMotion
                | SensorType::TiltDetector
                | SensorType::WakeGesture
                | SensorType::Glance
                | SensorType::Pickup
        )
    }
}

impl TryFrom<u8> for SensorType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SensorType::Accelerometer),
            2 => Ok(SensorType::Magnetometer),
            3 => Ok(SensorType::Orientation),
            4 => Ok(SensorType::Gyroscope),
            5 => Ok(SensorType::Light),
            6 => Ok(SensorType::Barometer),
            8 => Ok(SensorType::Proximity),
            9 => Ok(SensorType::Gravity),
            10 => Ok(SensorType::LinearAcceleration),
            11 => Ok(SensorType::RotationVector),
            12 => Ok(SensorType::Humidity),
            13 => Ok(SensorType::AmbientTemperature),
            14 => Ok(SensorType::UncalibratedMagnetometer),
            15 => Ok(SensorType::GameRotationVector),
            16 => Ok(SensorType::UncalibratedGyroscope),
            17 => Ok(SensorType::SignificantMotion),
            18 => Ok(SensorType::StepDetector),
            19 => Ok(SensorType::StepCounter),
            20 => Ok(SensorType::GeomagneticRotationVector),
            21 => Ok(SensorType::HeartRate),
            22 => Ok(SensorType::TiltDetector),
            23 => Ok(SensorType::WakeGesture),
            24 => Ok(SensorType::Glance),
            25 => Ok(SensorType::Pickup),
            31 => Ok(SensorType::ActivityRecognition),
            _ => Err(ProtocolError::InvalidSensorType(value)),
        }
    }
}
