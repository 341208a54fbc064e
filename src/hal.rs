// Hardware capabilities the drive core needs from a platform layer
//
// Register writes are treated as infallible: the core has no recovery path for
// a failed pin or duty write, so implementations handle their own faults.

use std::time::Duration;

/// Logic level of a binary line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(asserted: bool) -> Self {
        if asserted { Level::High } else { Level::Low }
    }
}

/// A binary output line (H-bridge direction input, sonar trigger)
pub trait DigitalOutput {
    fn set_level(&mut self, level: Level);

    fn set_high(&mut self) {
        self.set_level(Level::High);
    }

    fn set_low(&mut self) {
        self.set_level(Level::Low);
    }
}

/// A PWM channel running at a fixed carrier frequency
///
/// The new duty takes effect on the next PWM period boundary.
pub trait PwmChannel {
    /// Set duty cycle, 0 = off, 255 = fully on
    fn set_duty(&mut self, duty: u8);
}

/// An input that can time a HIGH pulse
pub trait EchoInput {
    /// Wait for the line to go HIGH and measure how long it stays HIGH.
    ///
    /// Returns the pulse width in microseconds, or 0 if no complete pulse was
    /// seen within `timeout`.
    fn pulse_width_us(&mut self, timeout: Duration) -> u64;
}

/// Microsecond-scale blocking delay
pub trait DelayUs {
    fn delay_us(&mut self, us: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<Level>);

    impl DigitalOutput for Recorder {
        fn set_level(&mut self, level: Level) {
            self.0.push(level);
        }
    }

    #[test]
    fn test_default_set_high_low() {
        let mut line = Recorder(Vec::new());
        line.set_high();
        line.set_low();
        assert_eq!(line.0, vec![Level::High, Level::Low]);
    }

    #[test]
    fn test_level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
    }
}
