//! Discrete-time PID law over a scalar error.
//!
//! Each `total_action()` computes the error `reference - measured`, adds
//! `error * dt` to the integral, differences the error against the previous
//! call, and returns `kp*e + ki*I + kd*D`.
//!
//! The integral accumulator is unbounded unless `integral_limit` is set. With
//! no limit a long saturation period winds the integral up without bound;
//! production loops should configure a limit.

use std::sync::Arc;
use std::time::Instant;

use romi_traits::clock::{Clock, MonotonicClock};
use tracing::trace;

use crate::config::{PidCfg, TimeStep};

pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    reference: f64,
    measured: f64,
    /// [previous, current]
    error: [f64; 2],
    integral: f64,
    derivative: f64,
    dt: f64,
    time_step: TimeStep,
    integral_limit: Option<f64>,
    clock: Arc<dyn Clock + Send + Sync>,
    prev_time: Instant,
}

impl core::fmt::Debug for PidController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PidController")
            .field("kp", &self.kp)
            .field("ki", &self.ki)
            .field("kd", &self.kd)
            .field("reference", &self.reference)
            .field("error", &self.error)
            .field("integral", &self.integral)
            .field("dt", &self.dt)
            .finish()
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidCfg::default())
    }
}

impl PidController {
    pub fn new(cfg: PidCfg) -> Self {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
        let prev_time = clock.now();
        let dt = match cfg.time_step {
            TimeStep::Fixed(dt) => dt,
            TimeStep::Dynamic => 0.0,
        };
        Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            reference: cfg.reference,
            measured: 0.0,
            error: [0.0, 0.0],
            integral: 0.0,
            derivative: 0.0,
            dt,
            time_step: cfg.time_step,
            integral_limit: cfg.integral_limit.map(f64::abs),
            clock,
            prev_time,
        }
    }

    /// Use `clock` for dynamic time steps. The first interval is measured
    /// from this call.
    pub fn with_clock<C: Clock + Send + Sync + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self.prev_time = self.clock.now();
        self
    }

    pub fn update_measured(&mut self, measured: f64) {
        self.measured = measured;
    }

    pub fn update_reference(&mut self, reference: f64) {
        self.reference = reference;
    }

    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Compute `reference - measured` and store it as the current error.
    pub fn error(&mut self) -> f64 {
        self.error[1] = self.reference - self.measured;
        self.error[1]
    }

    fn update_time_step(&mut self) {
        let now = self.clock.now();
        self.dt = now.saturating_duration_since(self.prev_time).as_secs_f64();
        self.prev_time = now;
    }

    fn integral_action(&mut self) {
        self.integral += self.error[1] * self.dt;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }
    }

    /// With a zero step the derivative is 0 and the previous error is kept.
    fn derivative_action(&mut self) {
        if self.dt != 0.0 {
            self.derivative = (self.error[1] - self.error[0]) / self.dt;
            self.error[0] = self.error[1];
        } else {
            self.derivative = 0.0;
        }
    }

    /// Run one control step and return the effort.
    pub fn total_action(&mut self) -> f64 {
        if matches!(self.time_step, TimeStep::Dynamic) {
            self.update_time_step();
        }
        self.error();
        self.integral_action();
        self.derivative_action();
        let u = self.kp * self.error[1] + self.ki * self.integral + self.kd * self.derivative;
        trace!(
            error = self.error[1],
            integral = self.integral,
            derivative = self.derivative,
            dt = self.dt,
            u,
            "pid step"
        );
        u
    }

    /// Clear the error history, integral and derivative.
    ///
    /// Never called automatically.
    pub fn reset(&mut self) {
        self.error = [0.0, 0.0];
        self.integral = 0.0;
        self.derivative = 0.0;
        self.prev_time = self.clock.now();
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn measured(&self) -> f64 {
        self.measured
    }

    /// Error computed by the latest step.
    pub fn last_error(&self) -> f64 {
        self.error[1]
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn derivative(&self) -> f64 {
        self.derivative
    }

    /// Time step used by the latest step, in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(kp: f64, ki: f64, kd: f64, dt: f64) -> PidController {
        PidController::new(PidCfg {
            kp,
            ki,
            kd,
            reference: 0.0,
            time_step: TimeStep::Fixed(dt),
            integral_limit: None,
        })
    }

    #[test]
    fn proportional_only_ignores_dt() {
        for dt in [0.0, 0.015, 1.0, 250.0] {
            let mut c = pid(2.0, 0.0, 0.0, dt);
            c.update_reference(10.0);
            c.update_measured(4.0);
            assert_eq!(c.total_action(), 12.0);
        }
    }

    #[test]
    fn integral_accumulates_without_bound() {
        let mut c = pid(0.0, 1.0, 0.0, 0.5);
        c.update_reference(4.0);
        for _ in 0..1000 {
            c.total_action();
        }
        assert_eq!(c.integral(), 2000.0);
    }

    #[test]
    fn integral_limit_clamps_when_configured() {
        let mut c = PidController::new(PidCfg {
            kp: 0.0,
            ki: 1.0,
            kd: 0.0,
            reference: 4.0,
            time_step: TimeStep::Fixed(0.5),
            integral_limit: Some(-3.0),
        });
        for _ in 0..10 {
            c.total_action();
        }
        assert_eq!(c.integral(), 3.0);
    }

    #[test]
    fn derivative_differences_errors() {
        let mut c = pid(0.0, 0.0, 1.0, 0.5);
        c.update_reference(1.0);
        assert_eq!(c.total_action(), 2.0); // (1 - 0) / 0.5
        assert_eq!(c.total_action(), 0.0);
        c.update_measured(-1.0);
        assert_eq!(c.total_action(), 2.0); // (2 - 1) / 0.5
    }

    #[test]
    fn zero_dt_derivative_is_zero_and_keeps_previous_error() {
        let mut c = pid(0.0, 0.0, 1.0, 0.0);
        c.update_reference(3.0);
        assert_eq!(c.total_action(), 0.0);
        assert_eq!(c.derivative(), 0.0);
        assert_eq!(c.integral(), 0.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut c = pid(1.0, 1.0, 1.0, 0.1);
        c.update_reference(5.0);
        c.total_action();
        c.reset();
        assert_eq!(c.integral(), 0.0);
        assert_eq!(c.derivative(), 0.0);
        assert_eq!(c.last_error(), 0.0);
        assert_eq!(c.reference(), 5.0);
    }
}
