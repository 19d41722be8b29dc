//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "romi", version, about = "Line-following robot controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/romi_config.toml")]
    pub config: PathBuf,

    /// Optional calibration file: CSV (sensor,dark,light) or TOML [calibration]
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log and report as JSON instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); RUST_LOG takes precedence,
    /// [logging].level applies when neither is given
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the line until a bump, Ctrl-C, or the cycle limit
    Run {
        /// Stop after this many control cycles (runs until interrupted if absent)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Add heading-hold correction on top of line following
        #[arg(long, action = ArgAction::SetTrue)]
        heading_hold: bool,
        /// Stop when any bumper fires (default from [control].stop_on_bump)
        #[arg(long, action = ArgAction::SetTrue, overrides_with = "no_stop_on_bump")]
        stop_on_bump: bool,
        /// Keep running after a bump; the flags are cleared and counted
        #[arg(long, action = ArgAction::SetTrue, overrides_with = "stop_on_bump")]
        no_stop_on_bump: bool,
    },
    /// Capture dark/light line baselines and the IMU reference, then save them
    Calibrate {
        /// Output TOML file holding the [calibration] table
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
        /// Time given to reposition the robot between passes
        #[arg(long, value_name = "MS", default_value_t = 3000)]
        pause_ms: u64,
    },
    /// Verify the orientation sensor and report calibration status
    SelfCheck,
}

impl Commands {
    /// Resolve the bump policy from the flags and the config default.
    pub fn stop_on_bump(stop: bool, no_stop: bool, default: bool) -> bool {
        if stop {
            true
        } else if no_stop {
            false
        } else {
            default
        }
    }
}
