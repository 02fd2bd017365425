use std::fmt;
use std::num::NonZeroU32;

use motus_core::TimestampHalf;

/// Device time converted to milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Elapsed {
    millis: u64,
}

impl Elapsed {
    pub fn from_ticks(ticks: u32, ticks_per_second: NonZeroU32) -> Self {
        Self {
            millis: u64::from(ticks) * 1000 / u64::from(ticks_per_second.get()),
        }
    }

    pub const fn as_millis(self) -> u64 {
        self.millis
    }
}

/// `SSS.mmm`, truncated, with seconds wrapping at 1000.
impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}.{:03}", (self.millis / 1000) % 1000, self.millis % 1000)
    }
}

/// Running 32-bit device timestamp, rebuilt from MSW/LSW timestamp packets.
#[derive(Debug, Clone, Copy)]
pub struct TimestampTracker {
    ticks: u32,
    ticks_per_second: NonZeroU32,
}

impl TimestampTracker {
    pub const fn new(ticks_per_second: NonZeroU32) -> Self {
        Self {
            ticks: 0,
            ticks_per_second,
        }
    }

    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    pub const fn ticks_per_second(&self) -> NonZeroU32 {
        self.ticks_per_second
    }

    /// Replace one half of the timestamp and return the new value.
    pub fn apply(&mut self, half: TimestampHalf, value: u16) -> u32 {
        let value = u32::from(value);

        self.ticks = match half {
            TimestampHalf::Lsw => (self.ticks & 0xFFFF_0000) | value,
            TimestampHalf::Msw => (self.ticks & 0x0000_FFFF) | (value << 16),
        };

        self.ticks
    }

    pub fn elapsed(&self) -> Elapsed {
        Elapsed::from_ticks(self.ticks, self.ticks_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: NonZeroU32 = NonZeroU32::new(3_200_000).unwrap();

    #[test]
    fn halves_replace_their_own_bits() {
        let mut clock = TimestampTracker::new(RATE);

        assert_eq!(clock.apply(TimestampHalf::Msw, 0x0030), 0x0030_0000);
        assert_eq!(clock.apply(TimestampHalf::Lsw, 0xD400), 3_200_000);
        assert_eq!(clock.apply(TimestampHalf::Lsw, 0xD401), 3_200_001);
        assert_eq!(clock.apply(TimestampHalf::Msw, 0x0031), 0x0031_D401);
    }

    #[test]
    fn elapsed_is_truncated_to_millis() {
        let mut clock = TimestampTracker::new(RATE);
        assert_eq!(clock.elapsed().to_string(), "000.000");

        clock.apply(TimestampHalf::Msw, 0x0030);
        clock.apply(TimestampHalf::Lsw, 0xD400);
        assert_eq!(clock.elapsed().to_string(), "001.000");

        // 1.2345 s
        let ticks = 3_950_400u32;
        clock.apply(TimestampHalf::Msw, (ticks >> 16) as u16);
        clock.apply(TimestampHalf::Lsw, ticks as u16);
        assert_eq!(clock.elapsed().as_millis(), 1234);
        assert_eq!(clock.elapsed().to_string(), "001.234");
    }

    #[test]
    fn seconds_wrap_at_three_digits() {
        let rate = NonZeroU32::new(1000).unwrap();
        assert_eq!(Elapsed::from_ticks(1_234_567, rate).to_string(), "234.567");
    }
}
