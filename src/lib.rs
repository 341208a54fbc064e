// Open-loop differential drive runtime
//
// Layers, leaf first:
// - hal: capability traits a platform implements (lines, PWM, echo timing)
// - sim: in-memory board implementing every capability
// - motor: PWM and direction drivers plus the timed motion controller
// - ranging: ultrasonic distance measurement, independent of motion
// - runtime: script execution and the ranging loop

pub mod config;
pub mod hal;
pub mod messages;
pub mod motor;
pub mod ranging;
pub mod runtime;
pub mod sim;
