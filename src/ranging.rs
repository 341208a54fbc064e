// Ultrasonic (HC-SR04 style) ranging
//
// Independent of the motion controller: nothing here is consulted while the
// robot moves. A reading is a single trigger/echo exchange bounded by
// `ECHO_TIMEOUT`; there are no retries.

use tracing::trace;

use crate::config::{ECHO_TIMEOUT, TRIGGER_PULSE_US, TRIGGER_SETTLE_US};
use crate::hal::{DelayUs, DigitalOutput, EchoInput};

/// Speed of sound at room temperature
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Returned by `measure_distance_cm` when no echo arrived in time
pub const NO_ECHO_CM: f32 = -1.0;

/// Convert a round-trip echo width to a one-way distance
pub fn echo_width_to_cm(width_us: u64) -> f32 {
    width_us as f32 * SPEED_OF_SOUND_CM_PER_US / 2.0
}

pub struct UltrasonicRanger<T: DigitalOutput, E: EchoInput, D: DelayUs> {
    trigger: T,
    echo: E,
    delay: D,
}

impl<T: DigitalOutput, E: EchoInput, D: DelayUs> UltrasonicRanger<T, E, D> {
    /// Takes ownership of the trigger line and drives it low
    pub fn new(mut trigger: T, echo: E, delay: D) -> Self {
        trigger.set_low();
        Self {
            trigger,
            echo,
            delay,
        }
    }

    /// Measure distance in centimeters.
    ///
    /// Returns `NO_ECHO_CM` (-1.0) if no echo was received within 30 ms
    /// (about 5 m of range). Callers must check for the sentinel.
    pub fn measure_distance_cm(&mut self) -> f32 {
        self.trigger.set_low();
        self.delay.delay_us(TRIGGER_SETTLE_US);
        self.trigger.set_high();
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger.set_low();

        let width_us = self.echo.pulse_width_us(ECHO_TIMEOUT);
        trace!("Echo width {} us", width_us);
        if width_us == 0 {
            return NO_ECHO_CM;
        }
        echo_width_to_cm(width_us)
    }

    /// `measure_distance_cm` with the sentinel mapped to `None`
    pub fn distance_cm(&mut self) -> Option<f32> {
        let d = self.measure_distance_cm();
        (d >= 0.0).then_some(d)
    }
}
