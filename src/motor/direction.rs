// Motor direction driver for an L298N-style H-bridge
//
// Each motor has two direction inputs (IN1/IN2 or IN3/IN4), called line A and
// line B here:
//
// | Direction | A | B |
// |-----------|---|---|
// | Forward   | 1 | 0 |
// | Backward  | 0 | 1 |
// | Coast     | 0 | 0 |
//
// Which of Forward/Backward actually spins the wheel forward depends on how the
// motor leads are wired, so each motor carries a `Polarity`. Verify it on the
// bench with a short drive before trusting a turn.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::hal::{DigitalOutput, Level};
use crate::messages::{Direction, Side};

/// Wiring polarity of one motor's direction lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Forward asserts line A
    #[default]
    Normal,
    /// Forward asserts line B (motor leads swapped)
    Inverted,
}

impl Polarity {
    /// Line levels `(a, b)` for a direction under this polarity
    pub fn levels(self, direction: Direction) -> (Level, Level) {
        let (a, b) = match direction {
            Direction::Forward => (true, false),
            Direction::Backward => (false, true),
            Direction::Coast => (false, false),
        };
        match self {
            Polarity::Normal => (a.into(), b.into()),
            Polarity::Inverted => (b.into(), a.into()),
        }
    }
}

/// The two direction inputs of one motor
pub struct MotorLines<O: DigitalOutput> {
    pub a: O,
    pub b: O,
}

impl<O: DigitalOutput> MotorLines<O> {
    pub fn new(a: O, b: O) -> Self {
        Self { a, b }
    }
}

/// Sets per-motor rotation direction for the left and right motors
pub struct DirectionDriver<O: DigitalOutput> {
    motors: [MotorLines<O>; 2], // [left, right]
    polarity: [Polarity; 2],
    direction: [Direction; 2],
}

impl<O: DigitalOutput> DirectionDriver<O> {
    pub fn new(
        left: MotorLines<O>,
        right: MotorLines<O>,
        left_polarity: Polarity,
        right_polarity: Polarity,
    ) -> Self {
        Self {
            motors: [left, right],
            polarity: [left_polarity, right_polarity],
            direction: [Direction::Coast; 2],
        }
    }

    pub fn set_direction(&mut self, motor: Side, direction: Direction) {
        let i = motor.index();
        let (a, b) = self.polarity[i].levels(direction);
        trace!("{:?} motor {:?}: A={:?} B={:?}", motor, direction, a, b);

        let lines = &mut self.motors[i];
        lines.a.set_level(a);
        lines.b.set_level(b);
        self.direction[i] = direction;
    }

    /// Deassert every direction line
    pub fn coast_all(&mut self) {
        for side in Side::BOTH {
            self.set_direction(side, Direction::Coast);
        }
    }

    /// Last direction commanded for a motor
    pub fn direction(&self, motor: Side) -> Direction {
        self.direction[motor.index()]
    }

    pub fn polarity(&self, motor: Side) -> Polarity {
        self.polarity[motor.index()]
    }
}
