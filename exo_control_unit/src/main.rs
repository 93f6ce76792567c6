//! # EXO Control Unit
//!
//! Loads the robot configuration, brings the drives up on the configured
//! transport and runs the gait state machine at the control rate.
//!
//! Operator input comes from a scripted scenario (`--scenario`). Without
//! one the kernel initialises the robot and holds in `Init`.

use clap::{Parser, ValueEnum};
use exo_common::consts::DEFAULT_CONFIG_PATH;
use exo_common::robot::FeedbackSource;
use exo_control_unit::config::{Overrides, load_config};
use exo_control_unit::cycle::{CycleRunner, rt_setup};
use exo_control_unit::input::{IdleIntent, IntentSource, ScriptedIntent};
use exo_hal::TransportRegistry;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FeedbackArg {
    /// Drive position telemetry.
    Telemetry,
    /// Last commanded angle (no hardware).
    LastCommand,
}

impl From<FeedbackArg> for FeedbackSource {
    fn from(arg: FeedbackArg) -> Self {
        match arg {
            FeedbackArg::Telemetry => FeedbackSource::Telemetry,
            FeedbackArg::LastCommand => FeedbackSource::LastCommand,
        }
    }
}

/// EXO Control Unit: exoskeleton gait control loop
#[derive(Parser, Debug)]
#[command(name = "exo_control_unit")]
#[command(version)]
#[command(about = "Gait state machine and drive control loop for a lower-limb exoskeleton")]
struct Args {
    /// Robot configuration TOML. Defaults to /etc/exo/robot.toml when present,
    /// otherwise the built-in reference robot.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the transport backend named in the config.
    #[arg(long)]
    transport: Option<String>,

    /// Override the joint feedback source.
    #[arg(long, value_enum)]
    feedback: Option<FeedbackArg>,

    /// Scripted operator session (TOML).
    #[arg(long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// Stop after this many ticks.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// CPU core to pin the control thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let overrides = Overrides {
        transport: args.transport.clone(),
        feedback: args.feedback.map(Into::into),
    };
    // Loaded before tracing so the file's log level applies; errors are
    // reported once the subscriber is up.
    let config_path = args.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    });
    let loaded = load_config(config_path.as_deref(), &overrides);
    let level = match &loaded {
        Ok(loaded) if !args.verbose => loaded.robot.shared.log_level.as_directive(),
        _ if args.verbose => "debug",
        _ => "info",
    };
    setup_tracing(level, args.json);

    info!("EXO Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|loaded| run(&args, loaded.robot));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("EXO Control Unit shutdown complete");
}

fn run(
    args: &Args,
    config: exo_common::robot::RobotConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let intent: Box<dyn IntentSource> = match &args.scenario {
        Some(path) => {
            info!(scenario = %path.display(), "replaying operator scenario");
            Box::new(ScriptedIntent::load(path)?)
        }
        None => Box::new(IdleIntent),
    };

    let registry = TransportRegistry::with_builtin();
    let mut runner = CycleRunner::from_config(&config, &registry, intent)?;
    info!(
        joints = config.joints.len(),
        transport = %config.control.transport,
        "robot built"
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        cpu_core = args.cpu_core,
        priority = args.rt_priority,
        "RT setup complete"
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let stats = runner.run(&running, args.max_cycles)?;
    info!(
        cycles = stats.cycle_count,
        overruns = stats.overruns,
        phase = runner.dispatcher().phase().name(),
        "control loop finished"
    );
    Ok(())
}

/// Setup tracing subscriber. `RUST_LOG`, when set, replaces `level`.
fn setup_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
