// Command and state types shared between the controller, the script runtime and the CLI

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which side of the robot a motor or PWM channel sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Rotation direction of a single motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    /// Both control lines deasserted, motor free-spins
    #[default]
    Coast,
}

/// Last commanded output of one motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorOutputState {
    pub direction: Direction,
    pub duty: u8,
}

impl MotorOutputState {
    /// Coast with zero duty, the state at startup and after every command
    pub fn is_stopped(&self) -> bool {
        self.direction == Direction::Coast && self.duty == 0
    }
}

/// Output state of both motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DriveState {
    pub left: MotorOutputState,
    pub right: MotorOutputState,
}

impl DriveState {
    pub fn is_stopped(&self) -> bool {
        self.left.is_stopped() && self.right.is_stopped()
    }
}

/// High-level motion request
///
/// The sign of `angle_deg` encodes the turn direction: positive turns right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionCommand {
    Forward { distance_cm: f32, speed_percent: i32 },
    Rotate { angle_deg: f32, speed_percent: i32 },
}

/// One step of a behavior script
// Untagged: motion steps carry a `kind`, pauses are `{ "pause_ms": N }`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Motion(MotionCommand),
    Pause { pause_ms: u64 },
}

/// Result of a single motion primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Non-positive magnitude or speed, nothing was written to the hardware
    Skipped,
    /// Motors ran for the full computed time
    Completed { run_time: Duration },
    /// Wait was cut short by a cancel request; motors were still stopped
    Cancelled { run_time: Duration, elapsed: Duration },
}

impl MotionOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MotionOutcome::Cancelled { .. })
    }
}
