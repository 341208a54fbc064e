// PWM output driver: speed percentage -> 8-bit duty on two channels

use tracing::{debug, trace};

use crate::config::{PWM_FREQUENCY_HZ, PWM_MAX_DUTY, PWM_RESOLUTION_BITS};
use crate::hal::PwmChannel;
use crate::messages::Side;

/// Convert a 0-100% speed to a 0-255 duty value.
///
/// Out-of-range input is clamped, never rejected. Rounds half away from zero,
/// so 50% maps to 128.
pub fn speed_percent_to_pwm(speed_percent: i32) -> u8 {
    let percent = speed_percent.clamp(0, 100) as u32;
    let max = PWM_MAX_DUTY as u32;
    ((percent * max + 50) / 100) as u8
}

/// Drives the left and right enable (PWM) channels
pub struct PwmOutputDriver<P: PwmChannel> {
    channels: [P; 2], // [left, right]
    duty: [u8; 2],
}

impl<P: PwmChannel> PwmOutputDriver<P> {
    pub fn new(left: P, right: P) -> Self {
        debug!(
            "PWM outputs: {} Hz carrier, {}-bit duty",
            PWM_FREQUENCY_HZ, PWM_RESOLUTION_BITS
        );
        Self {
            channels: [left, right],
            duty: [0; 2],
        }
    }

    /// Set a channel's duty from a speed percentage (clamped to 0-100)
    pub fn set_duty(&mut self, channel: Side, percent: i32) {
        self.write(channel, speed_percent_to_pwm(percent));
    }

    /// Zero both channels
    pub fn off(&mut self) {
        for side in Side::BOTH {
            self.write(side, 0);
        }
    }

    /// Last duty written to a channel
    pub fn duty(&self, channel: Side) -> u8 {
        self.duty[channel.index()]
    }

    fn write(&mut self, channel: Side, duty: u8) {
        trace!("PWM {:?} duty={}", channel, duty);
        self.channels[channel.index()].set_duty(duty);
        self.duty[channel.index()] = duty;
    }
}
