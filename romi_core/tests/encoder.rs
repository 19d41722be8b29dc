use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Duration;

use romi_core::config::EncoderCfg;
use romi_core::encoder::QuadratureFilter;
use romi_hardware::{SimParams, SimRobot, Side};
use romi_traits::clock::test_clock::TestClock;
use romi_traits::{HwResult, Motor, TickCounter};

/// Counter replaying a fixed sequence, then repeating its last value.
struct Script {
    counts: VecDeque<u16>,
    last: u16,
}

impl Script {
    fn new(counts: &[u16]) -> Self {
        Self {
            counts: counts.iter().copied().collect(),
            last: 0,
        }
    }
}

impl TickCounter for Script {
    fn count(&mut self) -> HwResult<u16> {
        if let Some(c) = self.counts.pop_front() {
            self.last = c;
        }
        Ok(self.last)
    }
}

struct Broken;

impl TickCounter for Broken {
    fn count(&mut self) -> HwResult<u16> {
        Err("encoder timer not running".into())
    }
}

fn rad_per_tick() -> f64 {
    TAU / 1440.0
}

#[test]
fn wrap_forward_accumulates_smoothed_position() {
    let clock = TestClock::new();
    let mut f = QuadratureFilter::new(Script::new(&[65_530, 10]), clock.clone(), &EncoderCfg::default());

    clock.advance(Duration::from_millis(10));
    f.update().unwrap();
    assert_eq!(f.delta(), -6);

    clock.advance(Duration::from_millis(10));
    f.update().unwrap();
    assert_eq!(f.delta(), 16);

    // means: -6/6 then (−6 + 16)/6
    let ticks = -1.0 + 10.0 / 6.0;
    assert!((f.position() - ticks * rad_per_tick()).abs() < 1e-12);
    assert_eq!(f.raw_count(), 10);
}

#[test]
fn velocity_is_zero_without_elapsed_time() {
    let clock = TestClock::new();
    let mut f = QuadratureFilter::new(Script::new(&[40]), clock.clone(), &EncoderCfg::default());
    f.update().unwrap();
    assert_eq!(f.dt(), 0.0);
    assert_eq!(f.velocity(), 0.0);
}

#[test]
fn velocity_is_zero_when_latest_interval_is_zero_with_full_window() {
    let clock = TestClock::new();
    let counts: Vec<u16> = (1..=7).map(|i| i * 12).collect();
    let mut f = QuadratureFilter::new(Script::new(&counts), clock.clone(), &EncoderCfg::default());
    for _ in 0..6 {
        clock.advance(Duration::from_millis(10));
        f.update().unwrap();
    }
    assert!(f.velocity() > 0.0);

    // Counter still moves, clock does not.
    f.update().unwrap();
    assert_eq!(f.delta(), 12);
    assert_eq!(f.dt(), 0.0);
    assert_eq!(f.velocity(), 0.0);
}

#[test]
fn steady_rate_gives_exact_velocity_once_window_fills() {
    let clock = TestClock::new();
    let counts: Vec<u16> = (1..=6).map(|i| i * 12).collect();
    let mut f = QuadratureFilter::new(Script::new(&counts), clock.clone(), &EncoderCfg::default());
    for _ in 0..6 {
        clock.advance(Duration::from_millis(10));
        f.update().unwrap();
    }
    let expected = 12.0 * rad_per_tick() / 0.010;
    assert!((f.velocity() - expected).abs() < 1e-9);
    assert!((f.time() - 0.060).abs() < 1e-12);
    assert!((f.dt() - 0.010).abs() < 1e-12);
}

#[test]
fn zero_resets_position_and_resyncs_counter() {
    let clock = TestClock::new();
    let mut f = QuadratureFilter::new(
        Script::new(&[100, 200, 200, 230]),
        clock.clone(),
        &EncoderCfg::default(),
    );
    clock.advance(Duration::from_millis(10));
    f.update().unwrap();
    clock.advance(Duration::from_millis(10));
    f.update().unwrap();
    assert!(f.position() > 0.0);

    f.zero().unwrap();
    assert_eq!(f.position(), 0.0);
    assert_eq!(f.raw_count(), 200);
    // velocity history survives the reset
    assert!(f.velocity() > 0.0);

    clock.advance(Duration::from_millis(10));
    f.update().unwrap();
    assert_eq!(f.delta(), 30);
}

#[test]
fn counter_failure_propagates() {
    let clock = TestClock::new();
    let mut f = QuadratureFilter::new(Broken, clock, &EncoderCfg::default());
    let err = f.update().unwrap_err();
    assert!(format!("{err:#}").contains("encoder timer not running"));
    assert_eq!(f.position(), 0.0);
}

#[test]
fn tracks_simulated_wheel_through_counter_wrap() {
    let clock = TestClock::new();
    let robot = SimRobot::new(SimParams::default(), clock.clone());
    let mut left = robot.motor(Side::Left);
    let mut right = robot.motor(Side::Right);
    for m in [&mut left, &mut right] {
        m.enable().unwrap();
        m.set_effort(40.0).unwrap();
    }

    let mut f = QuadratureFilter::new(robot.left_encoder(), clock.clone(), &EncoderCfg::default());
    f.zero().unwrap();
    assert_eq!(f.raw_count(), 65_000);

    for _ in 0..67 {
        clock.advance(Duration::from_millis(15));
        f.update().unwrap();
    }
    // one revolution per second at 40 %, minus the smoothing lag
    let pos = f.position();
    assert!(pos > 0.93 * TAU && pos < TAU, "position = {pos}");
    let vel = f.velocity();
    assert!((vel - TAU).abs() < 0.02 * TAU, "velocity = {vel}");
}
