use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tank_drive_runtime::config::{DriveConfig, RANGING_PERIOD};
use tank_drive_runtime::messages::{MotionCommand, ScriptStep};
use tank_drive_runtime::motor::CancelHandle;
use tank_drive_runtime::runtime::{self, RuntimeError};
use tank_drive_runtime::sim::SimBoard;

#[derive(Debug, Parser)]
#[command(version, about = "Open-loop differential drive runtime")]
struct Cli {
    /// JSON drive config (calibration, polarity, poll interval)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the distance calibration
    #[arg(long, global = true)]
    ms_per_cm: Option<f32>,

    /// Override the rotation calibration
    #[arg(long, global = true)]
    ms_per_degree: Option<f32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drive straight ahead
    Drive {
        distance_cm: f32,
        #[arg(default_value_t = 60)]
        speed_percent: i32,
    },
    /// Turn in place, positive angles turn right
    Rotate {
        #[arg(allow_negative_numbers = true)]
        angle_deg: f32,
        #[arg(default_value_t = 60)]
        speed_percent: i32,
    },
    /// Stop both motors
    Stop,
    /// Run a JSON script of motion steps (built-in turn demo if omitted)
    Script { path: Option<PathBuf> },
    /// Poll the ultrasonic ranger every 200 ms
    Range {
        /// Number of readings, runs until Ctrl-C if omitted
        #[arg(long)]
        count: Option<usize>,
        /// Distance of the simulated obstacle; nothing in range if omitted
        #[arg(long)]
        obstacle_cm: Option<f32>,
    },
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug or trace for per-pin writes)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RuntimeError> {
    let config = match &cli.config {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    }
    .with_calibration_overrides(cli.ms_per_cm, cli.ms_per_degree)?;

    let board = SimBoard::new();
    info!(
        "Simulated board: {} ms/cm, {} ms/deg, polarity left={:?} right={:?}",
        config.calibration.ms_per_cm(),
        config.calibration.ms_per_degree(),
        config.left_polarity,
        config.right_polarity
    );

    let steps = match cli.command {
        Command::Drive {
            distance_cm,
            speed_percent,
        } => vec![ScriptStep::Motion(MotionCommand::Forward {
            distance_cm,
            speed_percent,
        })],
        Command::Rotate {
            angle_deg,
            speed_percent,
        } => vec![ScriptStep::Motion(MotionCommand::Rotate {
            angle_deg,
            speed_percent,
        })],
        Command::Stop => Vec::new(),
        Command::Script { path } => match path {
            Some(path) => runtime::load_script(path)?,
            None => runtime::demo_script(),
        },
        Command::Range { count, obstacle_cm } => {
            match obstacle_cm {
                Some(d) => board.place_obstacle_cm(d),
                None => board.clear_obstacle(),
            }
            let mut ranger = board.ranger();
            let cancel = CancelHandle::default();
            let watcher = runtime::interrupt_on_ctrl_c(cancel.clone());
            let summary = runtime::run_ranging(&mut ranger, RANGING_PERIOD, count, &cancel).await;
            watcher.abort();
            info!(
                "{} reading(s), {} without echo",
                summary.readings, summary.no_echo
            );
            return Ok(());
        }
    };

    // Construction stops the motors, so `stop` needs no steps
    let mut controller = board.motion_controller(&config);
    let watcher = runtime::interrupt_on_ctrl_c(controller.cancel_handle());
    let report = runtime::run_script(&mut controller, &steps).await;
    watcher.abort();

    info!("Final output state: {:?}", controller.output_state());
    if report.interrupted {
        info!("Stopped early on request");
    }
    Ok(())
}
