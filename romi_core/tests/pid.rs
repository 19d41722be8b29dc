use std::time::Duration;

use romi_core::config::{PidCfg, TimeStep};
use romi_core::pid::PidController;
use romi_traits::clock::test_clock::TestClock;
use rstest::rstest;

fn cfg(kp: f64, ki: f64, kd: f64, time_step: TimeStep) -> PidCfg {
    PidCfg {
        kp,
        ki,
        kd,
        reference: 0.0,
        time_step,
        integral_limit: None,
    }
}

#[rstest]
#[case(TimeStep::Fixed(0.0))]
#[case(TimeStep::Fixed(0.015))]
#[case(TimeStep::Fixed(3.0))]
#[case(TimeStep::Dynamic)]
fn proportional_action_is_independent_of_dt(#[case] step: TimeStep) {
    let clock = TestClock::new();
    let mut pid = PidController::new(cfg(2.0, 0.0, 0.0, step)).with_clock(clock.clone());
    clock.advance(Duration::from_millis(7));
    pid.update_reference(10.0);
    pid.update_measured(4.0);
    assert_eq!(pid.total_action(), 12.0);
    assert_eq!(pid.last_error(), 6.0);
}

#[test]
fn dynamic_step_measures_seconds_between_calls() {
    let clock = TestClock::new();
    let mut pid = PidController::new(cfg(0.0, 1.0, 1.0, TimeStep::Dynamic)).with_clock(clock.clone());
    pid.update_reference(1.0);

    clock.advance(Duration::from_millis(20));
    let u = pid.total_action();
    assert!((pid.dt() - 0.020).abs() < 1e-12);
    assert!((pid.integral() - 0.020).abs() < 1e-12);
    // derivative: (1 - 0) / 0.02
    assert!((u - (0.020 + 50.0)).abs() < 1e-9);

    // no time passes: derivative is zero and the previous error is kept
    pid.update_measured(0.5);
    assert_eq!(pid.total_action(), pid.integral());
    assert_eq!(pid.dt(), 0.0);
    assert_eq!(pid.derivative(), 0.0);

    clock.advance(Duration::from_millis(10));
    pid.total_action();
    // (0.5 - 1.0) / 0.01 against the error kept from the first step
    assert!((pid.derivative() + 50.0).abs() < 1e-9);
}

#[test]
fn line_following_gains_steer_towards_center() {
    let mut pid = PidController::new(PidCfg {
        kp: 12.0,
        reference: 3.5,
        ..PidCfg::default()
    });
    pid.update_measured(5.0);
    assert!(pid.total_action() < 0.0);
    pid.update_measured(2.0);
    assert!(pid.total_action() > 0.0);
}

#[test]
fn gains_can_be_retuned_between_steps() {
    let mut pid = PidController::new(cfg(1.0, 0.0, 0.0, TimeStep::Fixed(0.015)));
    pid.update_reference(2.0);
    assert_eq!(pid.total_action(), 2.0);
    pid.set_gains(3.0, 0.0, 0.0);
    assert_eq!(pid.gains(), (3.0, 0.0, 0.0));
    assert_eq!(pid.total_action(), 6.0);
}
