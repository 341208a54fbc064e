// Time-based motion controller for a two-motor differential drive
//
// Open loop: every motion is "set directions, set duty, wait, stop". The wait
// length comes from the calibration profile, nothing measures what the wheels
// actually did.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use super::direction::{DirectionDriver, MotorLines};
use super::pwm::PwmOutputDriver;
use crate::config::{CalibrationProfile, DriveConfig};
use crate::hal::{DigitalOutput, PwmChannel};
use crate::messages::{Direction, DriveState, MotionCommand, MotionOutcome, MotorOutputState, Side};

/// Cuts a running motion short.
///
/// Clones share the same request. A request made while no motion is running is
/// discarded by the next direct motion call, but still ends a running script.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    requested: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Clear the request, returning whether one was pending
    fn take(&self) -> bool {
        self.inner.requested.swap(false, Ordering::SeqCst)
    }
}

/// Converts distance/angle requests into timed motor actuation.
///
/// Owns both drivers exclusively; the motors are stopped on construction and
/// at the end of every command.
pub struct MotionController<O: DigitalOutput, P: PwmChannel> {
    direction: DirectionDriver<O>,
    pwm: PwmOutputDriver<P>,
    calibration: CalibrationProfile,
    poll_interval: Duration,
    cancel: CancelHandle,
}

impl<O: DigitalOutput, P: PwmChannel> MotionController<O, P> {
    pub fn new(
        direction: DirectionDriver<O>,
        pwm: PwmOutputDriver<P>,
        calibration: CalibrationProfile,
        poll_interval: Duration,
    ) -> Self {
        let mut controller = Self {
            direction,
            pwm,
            calibration,
            poll_interval,
            cancel: CancelHandle::default(),
        };
        controller.stop_motors();
        controller
    }

    /// Build the drivers from raw lines and channels using a drive config
    pub fn from_config(
        left: MotorLines<O>,
        right: MotorLines<O>,
        left_pwm: P,
        right_pwm: P,
        config: &DriveConfig,
    ) -> Self {
        let direction =
            DirectionDriver::new(left, right, config.left_polarity, config.right_polarity);
        let pwm = PwmOutputDriver::new(left_pwm, right_pwm);
        Self::new(direction, pwm, config.calibration, config.poll_interval())
    }

    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Current direction and duty of both motors
    pub fn output_state(&self) -> DriveState {
        let motor = |side| MotorOutputState {
            direction: self.direction.direction(side),
            duty: self.pwm.duty(side),
        };
        DriveState {
            left: motor(Side::Left),
            right: motor(Side::Right),
        }
    }

    /// Zero both duties and coast both motors. Safe to call at any time.
    pub fn stop_motors(&mut self) {
        self.pwm.off();
        self.direction.coast_all();
    }

    /// Drive straight ahead for `distance_cm`.
    ///
    /// Does nothing if the distance or speed is not positive.
    pub async fn drive_forward(&mut self, distance_cm: f32, speed_percent: i32) -> MotionOutcome {
        self.discard_stale_cancel();
        self.forward(distance_cm, speed_percent).await
    }

    /// Tank-turn in place. Positive angles turn right, negative turn left.
    ///
    /// Does nothing if the angle is zero or the speed is not positive.
    pub async fn rotate(&mut self, angle_deg: f32, speed_percent: i32) -> MotionOutcome {
        self.discard_stale_cancel();
        self.turn(angle_deg, speed_percent).await
    }

    pub async fn execute(&mut self, command: MotionCommand) -> MotionOutcome {
        self.discard_stale_cancel();
        self.execute_in_sequence(command).await
    }

    /// Run one command of a sequence. A cancel that is already pending is
    /// honored: the motors are not driven and the outcome is `Cancelled`.
    pub(crate) async fn execute_in_sequence(&mut self, command: MotionCommand) -> MotionOutcome {
        match command {
            MotionCommand::Forward {
                distance_cm,
                speed_percent,
            } => self.forward(distance_cm, speed_percent).await,
            MotionCommand::Rotate {
                angle_deg,
                speed_percent,
            } => self.turn(angle_deg, speed_percent).await,
        }
    }

    fn discard_stale_cancel(&self) {
        if self.cancel.take() {
            debug!("Discarding cancel request made while idle");
        }
    }

    async fn forward(&mut self, distance_cm: f32, speed_percent: i32) -> MotionOutcome {
        // Negated comparison so NaN is skipped too
        if !(distance_cm > 0.0) || speed_percent <= 0 {
            debug!(
                "Skipping drive: distance={} cm, speed={}%",
                distance_cm, speed_percent
            );
            return MotionOutcome::Skipped;
        }

        let run_time = self.calibration.run_time_for_distance(distance_cm);
        info!(
            "Requested distance {} cm -> run time {} ms, speed {}%",
            distance_cm,
            run_time.as_millis(),
            speed_percent
        );

        self.run_timed(Direction::Forward, Direction::Forward, speed_percent, run_time)
            .await
    }

    async fn turn(&mut self, angle_deg: f32, speed_percent: i32) -> MotionOutcome {
        if angle_deg == 0.0 || angle_deg.is_nan() || speed_percent <= 0 {
            debug!(
                "Skipping rotate: angle={} deg, speed={}%",
                angle_deg, speed_percent
            );
            return MotionOutcome::Skipped;
        }

        let run_time = self.calibration.run_time_for_angle(angle_deg);
        info!(
            "Rotating {} degrees -> run time {} ms, speed {}%",
            angle_deg,
            run_time.as_millis(),
            speed_percent
        );

        let (left, right) = if angle_deg > 0.0 {
            (Direction::Forward, Direction::Backward)
        } else {
            (Direction::Backward, Direction::Forward)
        };
        self.run_timed(left, right, speed_percent, run_time).await
    }

    async fn run_timed(
        &mut self,
        left: Direction,
        right: Direction,
        speed_percent: i32,
        run_time: Duration,
    ) -> MotionOutcome {
        if self.cancel.is_cancelled() {
            self.stop_motors();
            info!("Motion cancelled before start");
            return MotionOutcome::Cancelled {
                run_time,
                elapsed: Duration::ZERO,
            };
        }

        self.direction.set_direction(Side::Left, left);
        self.direction.set_direction(Side::Right, right);
        self.pwm.set_duty(Side::Left, speed_percent);
        self.pwm.set_duty(Side::Right, speed_percent);

        let outcome = self.wait(run_time).await;

        // Termination step of every command, cancelled or not
        self.stop_motors();
        if let MotionOutcome::Cancelled { elapsed, .. } = outcome {
            info!("Motion cancelled after {} ms", elapsed.as_millis());
        }
        outcome
    }

    /// Poll in `poll_interval` steps until `run_time` has passed or a cancel
    /// is requested
    async fn wait(&self, run_time: Duration) -> MotionOutcome {
        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= run_time {
                return MotionOutcome::Completed { run_time };
            }
            if self.cancel.is_cancelled() {
                return MotionOutcome::Cancelled { run_time, elapsed };
            }

            let step = self.poll_interval.min(run_time - elapsed);
            tokio::select! {
                _ = time::sleep(step) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }
}
