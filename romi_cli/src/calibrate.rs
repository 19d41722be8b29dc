//! Calibration capture and the hardware self-check.

use std::path::Path;
use std::time::Duration;

use eyre::WrapErr;
use romi_config::{Config, PersistedCalibration};
use romi_core::error::Result;
use romi_core::hw_error::lift;
use romi_core::{CalibrationStatus, HeadingCorrector, ImuCfg, LineCentroidEstimator, LineCfg};
use romi_hardware::Surface;
use romi_traits::{MonotonicClock, TickCounter};
use serde_json::json;

use crate::robot::{Robot, present_surface};

fn status_json(s: CalibrationStatus) -> serde_json::Value {
    json!({ "sys": s.sys, "gyro": s.gyro, "accel": s.accel, "mag": s.mag })
}

/// Capture both line baselines, the heading reference and the IMU
/// coefficients, then persist them to `out`.
pub fn run_calibrate(
    cfg: &Config,
    robot: Robot,
    out: &Path,
    pause: Duration,
    json_mode: bool,
) -> Result<PersistedCalibration> {
    let clock = MonotonicClock::new();
    let sim = robot.sim.clone();
    let present = |surface: Surface| {
        present_surface(sim.as_ref(), surface, pause);
    };
    let Robot {
        line_sensors,
        line_even,
        line_odd,
        imu,
        ..
    } = robot;

    let mut line = LineCentroidEstimator::new(
        line_sensors,
        line_even,
        line_odd,
        clock,
        LineCfg::from(&cfg.line),
    )?;

    present(Surface::Dark);
    let dark = line.calibrate_dark().wrap_err("dark pass")?.to_vec();
    present(Surface::Light);
    let light = line.calibrate_light().wrap_err("light pass")?.to_vec();
    present(Surface::Track);

    let mut heading = HeadingCorrector::new(imu, clock, ImuCfg::from(&cfg.imu))?;
    let offset = heading.set_offset()?;
    let status = heading.calibration_status()?;
    if !status.is_fully_calibrated() {
        tracing::warn!(
            sys = status.sys,
            gyro = status.gyro,
            accel = status.accel,
            mag = status.mag,
            "orientation sensor not fully calibrated; stored coefficients may be poor"
        );
    }
    let coeffs = heading.calibration_coefficients()?;

    let cal = PersistedCalibration {
        dark,
        light,
        heading_offset_deg: Some(offset),
        imu_coefficients: Some(coeffs.as_bytes().to_vec()),
    };
    romi_config::save_calibration(out, &cal)
        .wrap_err_with(|| format!("save calibration to {}", out.display()))?;
    tracing::info!(path = %out.display(), "calibration saved");

    if json_mode {
        println!(
            "{}",
            json!({
                "dark": cal.dark,
                "light": cal.light,
                "heading_offset_deg": offset,
                "status": status_json(status),
                "path": out.display().to_string(),
            })
        );
    } else {
        println!("dark:  {:?}", cal.dark);
        println!("light: {:?}", cal.light);
        println!("heading offset: {offset:.2} deg");
        println!(
            "imu status: sys {} gyro {} accel {} mag {}",
            status.sys, status.gyro, status.accel, status.mag
        );
        println!("saved calibration to {}", out.display());
    }
    Ok(cal)
}

/// Probe every device once: orientation sensor identity and status, one
/// line read, both encoder counters.
pub fn run_self_check(cfg: &Config, robot: Robot, json_mode: bool) -> Result<()> {
    let clock = MonotonicClock::new();
    let Robot {
        mut left_encoder,
        mut right_encoder,
        line_sensors,
        line_even,
        line_odd,
        imu,
        ..
    } = robot;

    let mut heading = HeadingCorrector::new(imu, clock, ImuCfg::from(&cfg.imu))?;
    let status = heading.calibration_status()?;
    let raw_heading = heading.read_euler_angles()?;

    let mut line = LineCentroidEstimator::new(
        line_sensors,
        line_even,
        line_odd,
        clock,
        LineCfg::from(&cfg.line),
    )?;
    line.read_array()?;
    let raw = line.raw().to_vec();

    let left = lift(left_encoder.count(), "reading left encoder")?;
    let right = lift(right_encoder.count(), "reading right encoder")?;

    tracing::info!(?raw, left, right, raw_heading, "self-check complete");
    if json_mode {
        println!(
            "{}",
            json!({
                "ok": true,
                "status": status_json(status),
                "heading_deg": raw_heading,
                "line_raw": raw,
                "encoders": { "left": left, "right": right },
            })
        );
    } else {
        println!(
            "imu: ok (sys {} gyro {} accel {} mag {}), heading {raw_heading:.2} deg",
            status.sys, status.gyro, status.accel, status.mag
        );
        println!("line raw: {raw:?}");
        println!("encoders: left {left} right {right}");
        println!("self-check OK");
    }
    Ok(())
}
