// Script runtime and ranging loop
//
// The motion controller only knows single commands. This module is the
// orchestrating caller: it runs a list of steps strictly one after another and
// stops early when the cancel handle fires (Ctrl-C in the binary).

use std::path::Path;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::hal::{DelayUs, DigitalOutput, EchoInput, PwmChannel};
use crate::messages::{MotionCommand, MotionOutcome, ScriptStep};
use crate::motor::{CancelHandle, MotionController};
use crate::ranging::UltrasonicRanger;

/// Error types for the runtime
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error reading script {path}: {source}")]
    ScriptIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Turn right 90°, wait, turn back, wait
pub fn demo_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::Motion(MotionCommand::Rotate {
            angle_deg: 90.0,
            speed_percent: 60,
        }),
        ScriptStep::Pause { pause_ms: 1000 },
        ScriptStep::Motion(MotionCommand::Rotate {
            angle_deg: -90.0,
            speed_percent: 60,
        }),
        ScriptStep::Pause { pause_ms: 1000 },
    ]
}

/// Load a JSON array of script steps
pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<ScriptStep>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| RuntimeError::ScriptIo {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// What a script run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptReport {
    /// Outcome of every motion step that ran, in order
    pub outcomes: Vec<MotionOutcome>,
    /// True if a cancel ended the script before its last step
    pub interrupted: bool,
}

/// Run script steps in order, each one to completion before the next.
///
/// Motors are stopped when this returns, whether the script finished or not.
/// A cancel already pending on the controller's handle ends the script before
/// its first step.
pub async fn run_script<O, P>(
    controller: &mut MotionController<O, P>,
    steps: &[ScriptStep],
) -> ScriptReport
where
    O: DigitalOutput,
    P: PwmChannel,
{
    let cancel = controller.cancel_handle();
    let mut report = ScriptReport::default();

    for (i, step) in steps.iter().enumerate() {
        if cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }
        debug!("Step {}/{}: {:?}", i + 1, steps.len(), step);

        match *step {
            ScriptStep::Motion(command) => {
                let outcome = controller.execute_in_sequence(command).await;
                report.outcomes.push(outcome);
                if outcome.is_cancelled() {
                    report.interrupted = true;
                    break;
                }
            }
            ScriptStep::Pause { pause_ms } => {
                let interrupted = tokio::select! {
                    _ = sleep(Duration::from_millis(pause_ms)) => false,
                    _ = cancel.cancelled() => true,
                };
                if interrupted {
                    report.interrupted = true;
                    break;
                }
            }
        }
    }

    controller.stop_motors();
    if report.interrupted {
        warn!(
            "Script interrupted after {} motion step(s)",
            report.outcomes.len()
        );
    } else {
        info!("Script finished: {} motion step(s)", report.outcomes.len());
    }
    report
}

/// What a ranging loop observed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangingSummary {
    pub readings: usize,
    pub no_echo: usize,
    pub last_cm: Option<f32>,
}

/// Take a reading every `period` until `limit` readings were taken (forever if
/// `None`) or `cancel` fires
pub async fn run_ranging<T, E, D>(
    ranger: &mut UltrasonicRanger<T, E, D>,
    period: Duration,
    limit: Option<usize>,
    cancel: &CancelHandle,
) -> RangingSummary
where
    T: DigitalOutput,
    E: EchoInput,
    D: DelayUs,
{
    let mut summary = RangingSummary::default();
    let mut tick = interval(period);

    while limit.is_none_or(|n| summary.readings < n) {
        tokio::select! {
            _ = tick.tick() => {}
            _ = cancel.cancelled() => break,
        }

        summary.readings += 1;
        match ranger.distance_cm() {
            Some(d) => {
                info!("Distance: {:.1} cm", d);
                summary.last_cm = Some(d);
            }
            None => {
                info!("No echo detected");
                summary.no_echo += 1;
            }
        }
    }
    summary
}

/// Cancel `handle` on Ctrl-C. Abort the returned task once the work is done.
pub fn interrupt_on_ctrl_c(handle: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, stopping");
                handle.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;
    use crate::ranging::NO_ECHO_CM;
    use crate::sim::SimBoard;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_demo_script_runs_in_order() {
        let board = SimBoard::new();
        let mut controller = board.motion_controller(&DriveConfig::default());
        let start = Instant::now();

        let report = run_script(&mut controller, &demo_script()).await;

        let turn = MotionOutcome::Completed {
            run_time: Duration::from_millis(756),
        };
        assert_eq!(
            report,
            ScriptReport {
                outcomes: vec![turn, turn],
                interrupted: false,
            }
        );
        // Two turns plus two one-second pauses
        assert!(start.elapsed() >= Duration::from_millis(756 * 2 + 2000));
        assert!(controller.output_state().is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_steps_are_reported() {
        let board = SimBoard::new();
        let mut controller = board.motion_controller(&DriveConfig::default());
        let steps = [
            ScriptStep::Motion(MotionCommand::Forward {
                distance_cm: -3.0,
                speed_percent: 50,
            }),
            ScriptStep::Motion(MotionCommand::Forward {
                distance_cm: 1.0,
                speed_percent: 50,
            }),
        ];

        let report = run_script(&mut controller, &steps).await;
        assert_eq!(
            report.outcomes,
            vec![
                MotionOutcome::Skipped,
                MotionOutcome::Completed {
                    run_time: Duration::from_millis(80)
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pause_ends_script() {
        let board = SimBoard::new();
        let mut controller = board.motion_controller(&DriveConfig::default());
        let handle = controller.cancel_handle();
        let steps = demo_script();

        // First turn ends at 756 ms, cancel lands inside the following pause
        let (report, _) = tokio::join!(run_script(&mut controller, &steps), async move {
            sleep(Duration::from_millis(1200)).await;
            handle.cancel();
        });

        assert!(report.interrupted);
        assert_eq!(report.outcomes.len(), 1);
        assert!(!board.events().is_empty());
        assert!(controller.output_state().is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_cancel_is_not_lost_between_steps() {
        let board = SimBoard::new();
        let mut controller = board.motion_controller(&DriveConfig::default());
        controller.cancel_handle().cancel();
        board.clear_events();
        let start = Instant::now();

        let report = run_script(&mut controller, &demo_script()).await;

        assert!(report.interrupted);
        assert!(report.outcomes.is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(controller.output_state().is_stopped());
        // The next step of a running script also sees the request
        let outcome = controller
            .execute_in_sequence(MotionCommand::Forward {
                distance_cm: 10.0,
                speed_percent: 50,
            })
            .await;
        assert!(outcome.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_motion_ends_script() {
        let board = SimBoard::new();
        let mut controller = board.motion_controller(&DriveConfig::default());
        let handle = controller.cancel_handle();
        let steps = demo_script();

        let (report, _) = tokio::join!(run_script(&mut controller, &steps), async move {
            sleep(Duration::from_millis(300)).await;
            handle.cancel();
        });

        assert!(report.interrupted);
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].is_cancelled());
    }

    #[test]
    fn test_load_script_missing_file() {
        let err = load_script("/nonexistent/script.json").unwrap_err();
        assert!(matches!(err, RuntimeError::ScriptIo { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranging_loop_counts_readings() {
        let board = SimBoard::new();
        board.place_obstacle_cm(25.0);
        let mut ranger = board.ranger();
        let cancel = CancelHandle::default();
        let start = Instant::now();

        let summary =
            run_ranging(&mut ranger, Duration::from_millis(200), Some(3), &cancel).await;

        assert_eq!(summary.readings, 3);
        assert_eq!(summary.no_echo, 0);
        let last = summary.last_cm.unwrap();
        assert!((last - 25.0).abs() < 0.05);
        // First tick is immediate
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranging_loop_no_echo() {
        let board = SimBoard::new();
        let mut ranger = board.ranger();
        let cancel = CancelHandle::default();

        let summary = run_ranging(&mut ranger, Duration::from_millis(200), Some(2), &cancel).await;

        assert_eq!(summary.readings, 2);
        assert_eq!(summary.no_echo, 2);
        assert_eq!(summary.last_cm, None);
        assert_eq!(ranger.measure_distance_cm(), NO_ECHO_CM);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranging_loop_stops_on_cancel() {
        let board = SimBoard::new();
        let mut ranger = board.ranger();
        let cancel = CancelHandle::default();
        let trigger = cancel.clone();

        let (summary, _) = tokio::join!(
            run_ranging(&mut ranger, Duration::from_millis(200), None, &cancel),
            async move {
                sleep(Duration::from_millis(500)).await;
                trigger.cancel();
            }
        );

        // Readings at 0, 200 and 400 ms
        assert_eq!(summary.readings, 3);
    }
}
