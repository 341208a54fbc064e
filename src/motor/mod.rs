// Motor control for a two-motor differential drive
//
// Provides:
// - PWM output driver (speed percentage -> 8-bit duty)
// - Direction driver for an L298N-style H-bridge with configurable polarity
// - Time-based motion controller (drive forward, tank-turn, stop)

mod controller;
pub mod direction;
pub mod pwm;

pub use controller::{CancelHandle, MotionController};
pub use direction::{DirectionDriver, MotorLines, Polarity};
pub use pwm::{speed_percent_to_pwm, PwmOutputDriver};
