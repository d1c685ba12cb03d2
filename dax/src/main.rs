//! # DAX Supervisor Binary
//!
//! Runs the simulated dual-axis rig under the safety core with a scripted
//! motion sequence. Used for development and as a live demonstration that
//! the same control path the tests exercise behaves under a free-running
//! loop.
//!
//! # Usage
//!
//! ```bash
//! # Run the demo with the default config
//! dax --config config/rig.toml
//!
//! # Include an emergency-stop drill halfway through
//! dax --config config/rig.toml --demo-estop
//!
//! # Verbose logging, JSON output
//! dax -v --json
//! ```

use clap::Parser;
use dax_common::config::{ConfigLoader, RigConfig};
use dax_common::hal::DigitalIo;
use dax_common::motor::{Direction, MotionCommand};
use dax_hal::rig::{ESTOP_BUTTON_PIN, FAULT_INDICATOR_PIN, MOTOR_POWER_PIN};
use dax_hal::{SimPlatform, SimRig};
use dax_safety::{
    EncoderHealth, InterruptTable, MonitorSample, MotorHealth, PinSafetyOutputs, ResetResult,
    SafetyCore, SafetyInputs, SafetyState,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Watchdog refresh cadence in the demo loop [ms].
const REFRESH_EVERY_MS: u64 = 200;

/// DAX supervisor - simulated dual-axis stepper rig under the safety core
#[derive(Parser, Debug)]
#[command(name = "dax")]
#[command(version)]
#[command(about = "Simulated dual-axis stepper controller with safety core")]
struct Args {
    /// Path to the rig configuration file.
    #[arg(short, long, default_value = "config/rig.toml")]
    config: PathBuf,

    /// Number of 1 ms ticks to run.
    #[arg(long, default_value_t = 5000)]
    ticks: u32,

    /// Press and release the emergency button halfway through the run.
    #[arg(long)]
    demo_estop: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("dax startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("DAX v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = RigConfig::load(&args.config)?;
    config.validate()?;
    info!(
        "config loaded: {} ({} axes)",
        config.shared.service_name,
        config.axes.len()
    );

    let mut platform = SimPlatform::new(SimRig::new(&config)?);
    let table = InterruptTable::new();
    let mut safety = SafetyCore::new(&config.safety);
    safety.init(&table, &config.safety, platform.rig().now_ms())?;

    // Armed: power the motors and start the demo motion.
    platform.write(MOTOR_POWER_PIN, true)?;
    platform
        .rig_mut()
        .motor_mut(0)?
        .apply_command(MotionCommand::Move {
            direction: Direction::Forward,
            steps: 1000,
        })?;
    if config.axes.len() > 1 {
        platform
            .rig_mut()
            .motor_mut(1)?
            .apply_command(MotionCommand::Run {
                direction: Direction::Reverse,
                speed: 300.0,
            })?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_flag = running.clone();
    ctrlc::set_handler(move || {
        running_flag.store(false, Ordering::SeqCst);
    })?;

    let estop_at = args.demo_estop.then(|| u64::from(args.ticks / 2));
    run_loop(&mut platform, &mut safety, &config, &args, estop_at, &running)?;

    // Wind down: stop whatever still moves, persist sim state.
    for axis in 0..platform.rig().axis_count() {
        let _ = platform
            .rig_mut()
            .motor_mut(axis)?
            .apply_command(MotionCommand::SoftStop);
    }
    for _ in 0..2000 {
        platform.advance(1);
        if (0..platform.rig().axis_count())
            .all(|axis| !platform.rig().motor(axis).is_ok_and(|m| m.is_busy()))
        {
            break;
        }
    }
    platform.rig_mut().shutdown();

    let stats = safety.watchdog_stats();
    info!(
        "done: {} triggers, watchdog {}/{}/{} (refresh/missed/timeout), {} fault records",
        safety.trigger_count(),
        stats.refresh_count,
        stats.missed_count,
        stats.timeout_count,
        safety.fault_log().count()
    );
    Ok(())
}

fn run_loop(
    platform: &mut SimPlatform,
    safety: &mut SafetyCore,
    config: &RigConfig,
    args: &Args,
    estop_at: Option<u64>,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_refresh_ms = platform.rig().now_ms();
    let mut last_report_ms = 0u64;
    let mut drill = DrillStage::Waiting;

    for _ in 0..args.ticks {
        if !running.load(Ordering::SeqCst) {
            warn!("interrupted; shutting down");
            break;
        }

        platform.advance(config.tick_ms);
        let now_ms = platform.rig().now_ms();

        if let Some(at) = estop_at {
            drive_estop_drill(platform, safety, at, now_ms, &mut drill)?;
        }

        if now_ms.saturating_sub(last_refresh_ms) >= REFRESH_EVERY_MS {
            safety.refresh_watchdog(now_ms)?;
            last_refresh_ms = now_ms;
        }

        let inputs = sample_inputs(platform);
        let state = {
            let mut outputs =
                PinSafetyOutputs::new(platform, MOTOR_POWER_PIN, FAULT_INDICATOR_PIN);
            safety.poll(&inputs, &mut outputs, now_ms)?
        };

        if now_ms.saturating_sub(last_report_ms) >= 500 {
            last_report_ms = now_ms;
            report(platform, state, now_ms);
        }
    }
    Ok(())
}

/// Emergency-stop drill progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrillStage {
    Waiting,
    Pressed,
    Done,
}

/// Press the button at `at`, release and reset 200 ms later.
fn drive_estop_drill(
    platform: &mut SimPlatform,
    safety: &mut SafetyCore,
    at: u64,
    now_ms: u64,
    stage: &mut DrillStage,
) -> Result<(), Box<dyn std::error::Error>> {
    if *stage == DrillStage::Waiting && now_ms >= at {
        warn!("estop drill: button pressed");
        platform.rig_mut().io_mut().set_input(ESTOP_BUTTON_PIN, true)?;
        *stage = DrillStage::Pressed;
    } else if *stage == DrillStage::Pressed && now_ms >= at + 200 {
        platform
            .rig_mut()
            .io_mut()
            .set_input(ESTOP_BUTTON_PIN, false)?;
        let inputs = sample_inputs(platform);
        let result = {
            let mut outputs =
                PinSafetyOutputs::new(platform, MOTOR_POWER_PIN, FAULT_INDICATOR_PIN);
            safety.request_reset(&inputs, &mut outputs, now_ms)?
        };
        match result {
            ResetResult::Armed => {
                info!("estop drill: reset accepted, re-arming");
                platform.write(MOTOR_POWER_PIN, true)?;
            }
            other => warn!("estop drill: reset refused: {other:?}"),
        }
        *stage = DrillStage::Done;
    }
    Ok(())
}

fn sample_inputs(platform: &SimPlatform) -> SafetyInputs {
    let rig = platform.rig();
    let mut sample = MonitorSample::default();
    for axis in 0..rig.axis_count() {
        if let (Ok(motor), Ok(encoder)) = (rig.motor(axis), rig.encoder(axis)) {
            sample.motors[axis] = MotorHealth {
                status: motor.status(),
                fault: motor.active_fault(),
            };
            sample.encoders[axis] = EncoderHealth {
                magnet: encoder.magnet_status(),
            };
        }
    }
    SafetyInputs {
        button_pressed: platform.read(ESTOP_BUTTON_PIN).unwrap_or(false),
        sample,
    }
}

fn report(platform: &SimPlatform, state: SafetyState, now_ms: u64) {
    let rig = platform.rig();
    for axis in 0..rig.axis_count() {
        if let (Ok(motor), Ok(encoder)) = (rig.motor(axis), rig.encoder(axis)) {
            info!(
                "t={now_ms} ms axis {}: pos={} v={:.1} phase={:?} angle={:.1} [{state:?}]",
                motor.name(),
                motor.position(),
                motor.speed(),
                motor.phase(),
                encoder.actual_deg(),
            );
        }
    }
}

fn setup_tracing(args: &Args) {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
