//! Line-follow control loop: encoders, line centroid, optional heading hold,
//! PID steering, bump handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use romi_config::{Config, PersistedCalibration};
use romi_core::error::Result;
use romi_core::hw_error::lift;
use romi_core::{
    EncoderCfg, HeadingCorrector, ImuCfg, LineCalibration, LineCentroidEstimator, LineCfg, PidCfg,
    PidController, QuadratureFilter,
};
use romi_traits::{BumpSensor, Clock, MonotonicClock, Motor, RegisterBus};
use serde_json::json;

use crate::robot::Robot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cycles,
    Bump,
    Interrupted,
}

impl StopReason {
    pub fn name(self) -> &'static str {
        match self {
            Self::Cycles => "Cycles",
            Self::Bump => "Bump",
            Self::Interrupted => "Interrupted",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub cycles: Option<u64>,
    pub heading_hold: bool,
    pub stop_on_bump: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub cycles: u64,
    pub stop_reason: StopReason,
    pub left_rad: f64,
    pub right_rad: f64,
    pub left_rad_s: f64,
    pub right_rad_s: f64,
    pub centroid: f64,
    pub line_lost: bool,
    pub heading_deg: Option<f64>,
    pub bumps: u64,
    pub bumped_sensors: Vec<usize>,
    /// Cycles whose work ran past the period deadline.
    pub overruns: u64,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "cycles": self.cycles,
            "stop_reason": self.stop_reason.name(),
            "left_rad": self.left_rad,
            "right_rad": self.right_rad,
            "left_rad_s": self.left_rad_s,
            "right_rad_s": self.right_rad_s,
            "centroid": self.centroid,
            "line_lost": self.line_lost,
            "heading_deg": self.heading_deg,
            "bumps": self.bumps,
            "bumped_sensors": self.bumped_sensors,
            "overruns": self.overruns,
        })
    }

    pub fn print_text(&self) {
        println!("stopped: {} after {} cycles", self.stop_reason.name(), self.cycles);
        println!(
            "wheels: left {:.3} rad ({:.2} rad/s), right {:.3} rad ({:.2} rad/s)",
            self.left_rad, self.left_rad_s, self.right_rad, self.right_rad_s
        );
        if self.line_lost {
            println!("line: lost");
        } else {
            println!("line: centroid {:.3}", self.centroid);
        }
        if let Some(h) = self.heading_deg {
            println!("heading: {h:.2} deg");
        }
        if self.bumps > 0 {
            println!("bumps: {} (sensors {:?})", self.bumps, self.bumped_sensors);
        }
        if self.overruns > 0 {
            println!("missed deadlines: {}", self.overruns);
        }
    }
}

/// Bring up the orientation sensor, restoring stored coefficients and offset
/// when available; otherwise the current heading becomes zero.
pub fn init_heading<B: RegisterBus, C: Clock>(
    bus: B,
    clock: C,
    cfg: &Config,
    cal: Option<&PersistedCalibration>,
) -> Result<HeadingCorrector<B, C>> {
    let mut heading = HeadingCorrector::new(bus, clock, ImuCfg::from(&cfg.imu))?;
    if let Some(coeffs) = cal.and_then(|c| c.imu_coefficients.as_deref()) {
        heading.set_calibration_coefficients(coeffs)?;
    }
    match cal.and_then(|c| c.heading_offset_deg) {
        Some(offset) => heading.set_offset_to(offset),
        None => {
            heading.set_offset()?;
        }
    }
    Ok(heading)
}

pub fn run_follow(
    cfg: &Config,
    robot: Robot,
    cal: Option<&PersistedCalibration>,
    opts: RunOptions,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    let clock = MonotonicClock::new();
    let Robot {
        left_encoder,
        right_encoder,
        line_sensors,
        line_even,
        line_odd,
        imu,
        mut left_motor,
        mut right_motor,
        bumpers,
        ..
    } = robot;

    let enc_cfg = EncoderCfg::from(&cfg.encoder);
    let mut left = QuadratureFilter::new(left_encoder, clock, &enc_cfg);
    let mut right = QuadratureFilter::new(right_encoder, clock, &enc_cfg);
    left.zero()?;
    right.zero()?;

    let mut line = LineCentroidEstimator::new(
        line_sensors,
        line_even,
        line_odd,
        clock,
        LineCfg::from(&cfg.line),
    )?;
    match cal.filter(|c| !c.dark.is_empty() || !c.light.is_empty()) {
        Some(c) => line
            .set_calibration(LineCalibration::from(c))
            .wrap_err("restore line calibration")?,
        None => tracing::warn!("no line calibration loaded; every sensor reads neutral"),
    }

    let mut heading = if opts.heading_hold {
        Some(init_heading(imu, clock, cfg, cal)?)
    } else {
        None
    };

    let mut line_pid = PidController::new(PidCfg::from(&cfg.pid.line));
    line_pid.update_reference(line.center());
    let mut heading_pid = PidController::new(PidCfg::from(&cfg.pid.heading));

    lift(left_motor.enable(), "enable left motor")?;
    lift(right_motor.enable(), "enable right motor")?;
    tracing::info!(
        sensors = line.len(),
        heading_hold = opts.heading_hold,
        stop_on_bump = opts.stop_on_bump,
        "line follow start"
    );

    let mut state = LoopState::default();
    let result = control_loop(
        cfg,
        opts,
        &shutdown,
        clock,
        &mut Loop {
            left: &mut left,
            right: &mut right,
            line: &mut line,
            heading: heading.as_mut(),
            line_pid: &mut line_pid,
            heading_pid: &mut heading_pid,
            left_motor: &mut *left_motor,
            right_motor: &mut *right_motor,
            bumpers: &bumpers,
        },
        &mut state,
    );

    // Motors are released whatever happened in the loop.
    for (name, m) in [("left", &mut left_motor), ("right", &mut right_motor)] {
        if let Err(e) = m.set_effort(0.0).and_then(|()| m.disable()) {
            tracing::warn!(motor = name, error = %e, "failed to stop motor");
        }
    }
    let stop_reason = result?;

    let heading_deg = match heading.as_mut() {
        Some(h) => Some(h.corrected_heading()?),
        None => None,
    };
    let summary = RunSummary {
        cycles: state.cycles,
        stop_reason,
        left_rad: left.position(),
        right_rad: right.position(),
        left_rad_s: left.velocity(),
        right_rad_s: right.velocity(),
        centroid: line.centroid(),
        line_lost: line.centroid() == line.lost_sentinel(),
        heading_deg,
        bumps: state.bumps,
        bumped_sensors: state.bumped_sensors,
        overruns: state.overruns,
    };
    tracing::info!(
        cycles = summary.cycles,
        reason = stop_reason.name(),
        left_rad = summary.left_rad,
        right_rad = summary.right_rad,
        "line follow complete"
    );
    Ok(summary)
}

#[derive(Default)]
struct LoopState {
    cycles: u64,
    bumps: u64,
    bumped_sensors: Vec<usize>,
    overruns: u64,
}

type Filter = QuadratureFilter<Box<dyn romi_traits::TickCounter>, MonotonicClock>;
type Line = LineCentroidEstimator<
    Box<dyn romi_traits::AnalogInput>,
    Box<dyn romi_traits::DigitalOutput>,
    MonotonicClock,
>;

struct Loop<'a> {
    left: &'a mut Filter,
    right: &'a mut Filter,
    line: &'a mut Line,
    heading: Option<&'a mut HeadingCorrector<Box<dyn RegisterBus>, MonotonicClock>>,
    line_pid: &'a mut PidController,
    heading_pid: &'a mut PidController,
    left_motor: &'a mut dyn Motor,
    right_motor: &'a mut dyn Motor,
    bumpers: &'a romi_core::BumpArray<romi_core::BumpFlag>,
}

fn control_loop(
    cfg: &Config,
    opts: RunOptions,
    shutdown: &AtomicBool,
    clock: MonotonicClock,
    l: &mut Loop<'_>,
    state: &mut LoopState,
) -> Result<StopReason> {
    let period = Duration::from_millis(cfg.control.cycle_ms);
    let base = cfg.control.base_effort;
    let max = cfg.control.max_effort;
    let mut deadline = clock.now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(StopReason::Interrupted);
        }
        if opts.cycles.is_some_and(|n| state.cycles >= n) {
            return Ok(StopReason::Cycles);
        }

        l.left.update()?;
        l.right.update()?;

        l.line.update_ir()?;
        let centroid = l.line.centroid();
        if centroid == l.line.lost_sentinel() {
            tracing::debug!(cycle = state.cycles, "line lost");
        }
        l.line_pid.update_measured(centroid);
        let mut steer = l.line_pid.total_action();

        if let Some(h) = l.heading.as_deref_mut() {
            let err = h.heading_error(0.0)?;
            l.heading_pid.update_measured(err);
            steer -= l.heading_pid.total_action();
        }

        let left_effort = (base - steer).clamp(-max, max);
        let right_effort = (base + steer).clamp(-max, max);
        lift(l.left_motor.set_effort(left_effort), "drive left motor")?;
        lift(l.right_motor.set_effort(right_effort), "drive right motor")?;
        tracing::debug!(
            cycle = state.cycles,
            centroid,
            steer,
            left_effort,
            right_effort,
            left_rad = l.left.position(),
            right_rad = l.right.position(),
            "cycle"
        );

        state.cycles += 1;

        if l.bumpers.is_triggered() {
            state.bumps += 1;
            for i in l.bumpers.triggered() {
                if !state.bumped_sensors.contains(&i) {
                    state.bumped_sensors.push(i);
                }
            }
            if opts.stop_on_bump {
                tracing::info!(sensors = ?state.bumped_sensors, "bump: stopping");
                return Ok(StopReason::Bump);
            }
            tracing::info!(sensors = ?state.bumped_sensors, "bump: continuing");
            l.bumpers.reset();
        }

        deadline += period;
        let now = clock.now();
        if deadline > now {
            clock.sleep(deadline - now);
        } else {
            state.overruns += 1;
            tracing::trace!(late_us = clock.us_since(deadline), "cycle overran");
            deadline = now;
        }
    }
}
