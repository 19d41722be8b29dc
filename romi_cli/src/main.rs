mod calibrate;
mod cli;
mod error_fmt;
mod follow;
mod robot;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use romi_config::{Config, PersistedCalibration};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::follow::RunOptions;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = ?err, "command failed");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("read config {}", cli.config.display()))?;
    let cfg = romi_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", cli.config.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;

    init_tracing(&cli, &cfg)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let calibration = resolve_calibration(&cfg, cli.calibration.as_deref())?;
    if let Some(cal) = &calibration
        && !cal.dark.is_empty()
        && cal.dark.len() != cfg.pins.line_channels.len()
    {
        eyre::bail!(
            "calibration arrays must have one entry per line sensor ({})",
            cfg.pins.line_channels.len()
        );
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let robot = robot::open(&cfg)?;
    match cli.cmd {
        Commands::Run {
            cycles,
            heading_hold,
            stop_on_bump,
            no_stop_on_bump,
        } => {
            let opts = RunOptions {
                cycles,
                heading_hold: heading_hold || cfg.control.heading_hold,
                stop_on_bump: Commands::stop_on_bump(
                    stop_on_bump,
                    no_stop_on_bump,
                    cfg.control.stop_on_bump,
                ),
            };
            let summary =
                follow::run_follow(&cfg, robot, calibration.as_ref(), opts, shutdown)?;
            if cli.json {
                println!("{}", summary.to_json());
            } else {
                summary.print_text();
            }
        }
        Commands::Calibrate { out, pause_ms } => {
            calibrate::run_calibrate(
                &cfg,
                robot,
                &out,
                Duration::from_millis(pause_ms),
                cli.json,
            )?;
        }
        Commands::SelfCheck => calibrate::run_self_check(&cfg, robot, cli.json)?,
    }
    Ok(())
}

/// A `--calibration` file wins over the config's `[calibration]` table.
fn resolve_calibration(
    cfg: &Config,
    path: Option<&Path>,
) -> eyre::Result<Option<PersistedCalibration>> {
    match path {
        Some(p) => {
            let cal = romi_config::load_calibration(p)
                .wrap_err_with(|| format!("load calibration {}", p.display()))?;
            cal.validate()?;
            Ok(Some(cal))
        }
        None => Ok(cfg.calibration.clone()),
    }
}

/// Logs go to stderr (JSON lines with `--json`) and, when `[logging].file` is
/// set, to a rolling file as well. The filter comes from `RUST_LOG`, then
/// `--log-level`, then `[logging].level`.
fn init_tracing(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let level = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| cli.log_level.clone())
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&level).wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let file_writer = match cfg.logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
            let appender = match cfg.logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => eyre::bail!("logging.rotation must be never, daily or hourly, got {other}"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = match (cli.json, file_writer) {
        (true, Some(w)) => builder
            .json()
            .with_writer(std::io::stderr.and(w))
            .try_init(),
        (true, None) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, Some(w)) => builder
            .with_writer(std::io::stderr.and(w))
            .try_init(),
        (false, None) => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| eyre::eyre!("init logging: {e}"))
}
