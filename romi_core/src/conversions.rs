//! `From` implementations bridging `romi_config` types to `romi_core` types.

use std::time::Duration;

use crate::calibration::LineCalibration;
use crate::config::{EncoderCfg, ImuCfg, LineCfg, PidCfg, TimeStep};

// ── EncoderCfg ───────────────────────────────────────────────────────────────

impl From<&romi_config::EncoderCfg> for EncoderCfg {
    fn from(c: &romi_config::EncoderCfg) -> Self {
        Self {
            ticks_per_rev: c.ticks_per_rev,
        }
    }
}

// ── LineCfg ──────────────────────────────────────────────────────────────────

impl From<&romi_config::LineCfg> for LineCfg {
    fn from(c: &romi_config::LineCfg) -> Self {
        Self {
            read_settle: Duration::from_micros(c.read_settle_us),
            calibrate_settle: Duration::from_micros(c.calibrate_settle_us),
            round_digits: c.round_digits,
        }
    }
}

// ── ImuCfg ───────────────────────────────────────────────────────────────────

impl From<&romi_config::ImuCfg> for ImuCfg {
    fn from(c: &romi_config::ImuCfg) -> Self {
        Self {
            config_settle: Duration::from_millis(c.config_settle_ms),
            fusion_settle: Duration::from_millis(c.fusion_settle_ms),
            mode_switch: Duration::from_millis(c.mode_switch_ms),
            gyro_scale: c.gyro_scale,
        }
    }
}

// ── PidCfg ───────────────────────────────────────────────────────────────────

impl From<&romi_config::PidCfg> for PidCfg {
    fn from(c: &romi_config::PidCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            reference: c.reference,
            time_step: if c.dynamic_dt {
                TimeStep::Dynamic
            } else {
                TimeStep::Fixed(c.dt_s)
            },
            integral_limit: c.integral_limit,
        }
    }
}

// ── LineCalibration ──────────────────────────────────────────────────────────

impl From<&romi_config::PersistedCalibration> for LineCalibration {
    fn from(c: &romi_config::PersistedCalibration) -> Self {
        Self {
            dark: c.dark.clone(),
            light: c.light.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_dynamic_flag_selects_time_step() {
        let fixed = PidCfg::from(&romi_config::PidCfg {
            dt_s: 0.02,
            ..romi_config::PidCfg::default()
        });
        assert_eq!(fixed.time_step, TimeStep::Fixed(0.02));

        let dynamic = PidCfg::from(&romi_config::PidCfg {
            dynamic_dt: true,
            ..romi_config::PidCfg::default()
        });
        assert_eq!(dynamic.time_step, TimeStep::Dynamic);
    }

    #[test]
    fn settle_times_keep_units() {
        let line = LineCfg::from(&romi_config::LineCfg::default());
        assert_eq!(line, LineCfg::default());
        let imu = ImuCfg::from(&romi_config::ImuCfg::default());
        assert_eq!(imu, ImuCfg::default());
    }
}
