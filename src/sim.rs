// Simulated robot board
//
// Implements every hardware capability in memory so the motion controller and
// the ranging utility can run without a robot attached. All handles handed out
// by a `SimBoard` share one state, which records every line and duty write in
// order for inspection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::config::DriveConfig;
use crate::hal::{DelayUs, DigitalOutput, EchoInput, Level, PwmChannel};
use crate::messages::Side;
use crate::motor::{MotionController, MotorLines};
use crate::ranging::{UltrasonicRanger, SPEED_OF_SOUND_CM_PER_US};

/// Binary output lines on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineId {
    /// IN1
    LeftA,
    /// IN2
    LeftB,
    /// IN3
    RightA,
    /// IN4
    RightB,
    /// Sonar trigger
    Trigger,
}

impl LineId {
    pub const MOTOR_LINES: [LineId; 4] =
        [LineId::LeftA, LineId::LeftB, LineId::RightA, LineId::RightB];
}

/// A write observed by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    Line { line: LineId, level: Level },
    Duty { channel: Side, duty: u8 },
}

#[derive(Debug, Default)]
struct BoardState {
    levels: HashMap<LineId, Level>,
    duty: [u8; 2],
    events: Vec<BoardEvent>,
    /// Echo pulse width the sonar would report, 0 = nothing in range
    echo_width_us: u64,
    /// Set on a trigger rising edge, consumed by the next echo measurement
    trigger_armed: bool,
    delayed_us: u64,
}

/// Shared in-memory board
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        // State stays consistent across a panicking test thread
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn line(&self, line: LineId) -> SimLine {
        SimLine {
            board: self.clone(),
            line,
        }
    }

    pub fn pwm(&self, channel: Side) -> SimPwm {
        SimPwm {
            board: self.clone(),
            channel,
        }
    }

    pub fn echo(&self) -> SimEcho {
        SimEcho { board: self.clone() }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay { board: self.clone() }
    }

    /// Motion controller wired to this board's motor lines and channels
    pub fn motion_controller(&self, config: &DriveConfig) -> MotionController<SimLine, SimPwm> {
        MotionController::from_config(
            MotorLines::new(self.line(LineId::LeftA), self.line(LineId::LeftB)),
            MotorLines::new(self.line(LineId::RightA), self.line(LineId::RightB)),
            self.pwm(Side::Left),
            self.pwm(Side::Right),
            config,
        )
    }

    /// Ultrasonic ranger wired to this board's trigger and echo
    pub fn ranger(&self) -> UltrasonicRanger<SimLine, SimEcho, SimDelay> {
        UltrasonicRanger::new(self.line(LineId::Trigger), self.echo(), self.delay())
    }

    /// Current level of a line (Low until first written)
    pub fn level(&self, line: LineId) -> Level {
        self.lock().levels.get(&line).copied().unwrap_or(Level::Low)
    }

    pub fn duty(&self, channel: Side) -> u8 {
        self.lock().duty[channel.index()]
    }

    /// All writes since creation or the last `clear_events`
    pub fn events(&self) -> Vec<BoardEvent> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Total time spent in microsecond delays
    pub fn delayed_us(&self) -> u64 {
        self.lock().delayed_us
    }

    pub fn set_echo_width_us(&self, width_us: u64) {
        self.lock().echo_width_us = width_us;
    }

    /// Put a reflecting object `distance_cm` in front of the sonar
    pub fn place_obstacle_cm(&self, distance_cm: f32) {
        let width = (distance_cm.max(0.0) * 2.0 / SPEED_OF_SOUND_CM_PER_US).round() as u64;
        self.set_echo_width_us(width);
    }

    /// Nothing in range, every measurement times out
    pub fn clear_obstacle(&self) {
        self.set_echo_width_us(0);
    }
}

/// Simulated binary output line
#[derive(Debug, Clone)]
pub struct SimLine {
    board: SimBoard,
    line: LineId,
}

impl DigitalOutput for SimLine {
    fn set_level(&mut self, level: Level) {
        trace!("sim line {:?} -> {:?}", self.line, level);
        let mut state = self.board.lock();
        let previous = state.levels.insert(self.line, level).unwrap_or(Level::Low);
        if self.line == LineId::Trigger && previous == Level::Low && level == Level::High {
            state.trigger_armed = true;
        }
        state.events.push(BoardEvent::Line {
            line: self.line,
            level,
        });
    }
}

/// Simulated PWM channel
#[derive(Debug, Clone)]
pub struct SimPwm {
    board: SimBoard,
    channel: Side,
}

impl PwmChannel for SimPwm {
    fn set_duty(&mut self, duty: u8) {
        trace!("sim pwm {:?} -> {}", self.channel, duty);
        let mut state = self.board.lock();
        state.duty[self.channel.index()] = duty;
        state.events.push(BoardEvent::Duty {
            channel: self.channel,
            duty,
        });
    }
}

/// Simulated sonar echo input
#[derive(Debug, Clone)]
pub struct SimEcho {
    board: SimBoard,
}

impl EchoInput for SimEcho {
    fn pulse_width_us(&mut self, timeout: Duration) -> u64 {
        let mut state = self.board.lock();
        // No trigger pulse, no echo
        if !std::mem::take(&mut state.trigger_armed) {
            return 0;
        }
        if state.echo_width_us as u128 > timeout.as_micros() {
            return 0;
        }
        state.echo_width_us
    }
}

/// Simulated microsecond delay, only accumulates the requested time
#[derive(Debug, Clone)]
pub struct SimDelay {
    board: SimBoard,
}

impl DelayUs for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.board.lock().delayed_us += us as u64;
    }
}
