//! Configuration types for the sensing/control core.
//!
//! These are the runtime configuration structs consumed by the filters and
//! controllers. They are separate from the TOML-deserialized config in
//! `romi_config`; see `conversions` for the bridge.

use std::time::Duration;

/// Quadrature encoder parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderCfg {
    /// Counter ticks per wheel revolution (after x4 quadrature decoding).
    pub ticks_per_rev: u32,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            ticks_per_rev: 1440,
        }
    }
}

impl EncoderCfg {
    /// Radians per counter tick.
    pub fn radians_per_tick(&self) -> f64 {
        std::f64::consts::TAU / f64::from(self.ticks_per_rev.max(1))
    }
}

/// Line sensor array timing and normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineCfg {
    /// Settle time after powering the array before a read.
    pub read_settle: Duration,
    /// Extra settle time before a calibration capture.
    pub calibrate_settle: Duration,
    /// Decimal digits kept by normalization.
    pub round_digits: u32,
}

impl Default for LineCfg {
    fn default() -> Self {
        Self {
            read_settle: Duration::from_micros(50),
            calibrate_settle: Duration::from_micros(200),
            round_digits: 5,
        }
    }
}

/// Orientation sensor bring-up parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuCfg {
    /// Delay after entering configuration mode.
    pub config_settle: Duration,
    /// Delay after entering fusion mode.
    pub fusion_settle: Duration,
    /// Delay applied by every operating-mode write.
    pub mode_switch: Duration,
    /// Raw gyroscope counts per degree per second.
    pub gyro_scale: f64,
}

impl Default for ImuCfg {
    fn default() -> Self {
        Self {
            config_settle: Duration::from_millis(20),
            fusion_settle: Duration::from_millis(30),
            mode_switch: Duration::from_millis(30),
            gyro_scale: 16.0,
        }
    }
}

/// How the PID controller obtains its time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    /// Constant step in seconds.
    Fixed(f64),
    /// Measure elapsed seconds between `total_action` calls.
    Dynamic,
}

/// PID gains and options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Initial setpoint.
    pub reference: f64,
    pub time_step: TimeStep,
    /// Symmetric clamp on the integral accumulator. `None` keeps the
    /// accumulator unbounded (no anti-windup).
    pub integral_limit: Option<f64>,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            reference: 0.0,
            time_step: TimeStep::Fixed(0.015),
            integral_limit: None,
        }
    }
}
