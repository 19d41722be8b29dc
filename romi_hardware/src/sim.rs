//! Kinematic simulation of a two-wheeled robot over a straight line.
//!
//! One shared world integrates wheel motion lazily: every sensor access first
//! advances the physics up to `clock.now()`. With a `TestClock` this makes a
//! whole control loop deterministic.
//!
//! Frame: the line runs along +x at y = 0. `theta` is counter-clockwise in
//! radians; the orientation sensor reports clockwise-positive heading like
//! the real device. Line sensors are indexed left to right.

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use romi_traits::{AnalogInput, Clock, DigitalOutput, HwResult, Motor, RegisterBus, TickCounter};
use tracing::{debug, info, trace};

use crate::error::HwError;
use crate::util::{DEFAULT_MAX_EFFORT, clamp_effort};

/// Register addresses served by the simulated orientation sensor.
pub mod reg {
    pub const CHIP_ID: u8 = 0x00;
    pub const GYR_DATA: u8 = 0x14;
    pub const EULER_DATA: u8 = 0x1A;
    pub const CALIB_STAT: u8 = 0x35;
    pub const OPR_MODE: u8 = 0x3D;
    pub const CALIB_DATA: u8 = 0x55;
    pub const CALIB_LEN: usize = 22;
    pub const SPACE: usize = 0x80;
    pub const CHIP_ID_VALUE: u8 = 0xA0;
}

/// Longest physics step; longer gaps are integrated in slices.
const MAX_STEP_S: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    pub sensors: usize,
    pub sensor_pitch_m: f64,
    pub line_width_m: f64,
    pub dark_raw: u16,
    pub light_raw: u16,
    pub ticks_per_rev: f64,
    pub wheel_radius_m: f64,
    pub track_m: f64,
    /// Wheel revolutions per second at 100 % effort.
    pub max_wheel_rps: f64,
    pub max_effort: f64,
    /// Starting counter value; close to the top so the first run wraps.
    pub initial_count: u16,
    /// Starting lateral offset from the line (left positive).
    pub initial_offset_m: f64,
    pub initial_heading_deg: f64,
    /// Distance along the line at which the front bumpers hit something.
    pub obstacle_m: Option<f64>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            sensors: 6,
            sensor_pitch_m: 0.008,
            line_width_m: 0.018,
            dark_raw: 3900,
            light_raw: 400,
            ticks_per_rev: 1440.0,
            wheel_radius_m: 0.035,
            track_m: 0.141,
            max_wheel_rps: 2.5,
            max_effort: DEFAULT_MAX_EFFORT,
            initial_count: 65_000,
            initial_offset_m: 0.006,
            initial_heading_deg: 0.0,
            obstacle_m: None,
        }
    }
}

/// Fault switches for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    Adc,
    Bus,
    Counter,
}

/// What the line sensors are looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Surface {
    /// The line on a light floor, seen from the robot's pose.
    #[default]
    Track,
    /// Uniform dark reference.
    Dark,
    /// Uniform light reference.
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn idx(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimPose {
    pub x_m: f64,
    pub y_m: f64,
    /// Clockwise-positive heading in [0, 360).
    pub heading_deg: f64,
}

type BumpHook = Box<dyn FnMut() + Send>;

struct World {
    params: SimParams,
    last: Instant,
    x: f64,
    y: f64,
    theta: f64,
    omega: f64,
    wheel_ticks: [f64; 2],
    effort: [f64; 2],
    enabled: [bool; 2],
    bank_power: [bool; 2],
    surface: Surface,
    regs: [u8; reg::SPACE],
    mode_writes: Vec<u8>,
    faults: Vec<SimFault>,
    bumped: bool,
    bump_hooks: Vec<BumpHook>,
}

impl World {
    fn integrate(&mut self, now: Instant) {
        let mut remaining = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        while remaining > 0.0 {
            let h = remaining.min(MAX_STEP_S);
            remaining -= h;
            self.step(h);
        }
    }

    fn step(&mut self, h: f64) {
        let p = self.params;
        let mut w = [0.0; 2];
        for side in 0..2 {
            if self.enabled[side] {
                w[side] = self.effort[side] / 100.0 * p.max_wheel_rps * TAU;
            }
            self.wheel_ticks[side] += w[side] / TAU * p.ticks_per_rev * h;
        }
        let v = (w[0] + w[1]) / 2.0 * p.wheel_radius_m;
        self.omega = (w[1] - w[0]) * p.wheel_radius_m / p.track_m;
        self.theta += self.omega * h;
        self.x += v * self.theta.cos() * h;
        self.y += v * self.theta.sin() * h;

        if let Some(obstacle) = p.obstacle_m
            && !self.bumped
            && self.x >= obstacle
        {
            self.bumped = true;
            debug!(x = self.x, "simulated bumper contact");
            for hook in &mut self.bump_hooks {
                hook();
            }
        }
    }

    fn count(&self, side: usize) -> u16 {
        let ticks = self.wheel_ticks[side].floor() as i64 + i64::from(self.params.initial_count);
        ticks.rem_euclid(65_536) as u16
    }

    fn heading_deg(&self) -> f64 {
        let deg = (-self.theta).to_degrees().rem_euclid(360.0);
        if deg >= 360.0 { 0.0 } else { deg }
    }

    fn reflectance(&self, i: usize) -> u16 {
        let p = self.params;
        let bank = i % 2;
        if !self.bank_power[bank] {
            return 0;
        }
        match self.surface {
            Surface::Dark => return p.dark_raw,
            Surface::Light => return p.light_raw,
            Surface::Track => {}
        }
        let center = (p.sensors as f64 + 1.0) / 2.0;
        let lateral = (center - (i as f64 + 1.0)) * p.sensor_pitch_m;
        let d = self.y + lateral * self.theta.cos();
        let sigma = p.line_width_m / 2.0;
        let intensity = (-(d / sigma).powi(2)).exp();
        let span = f64::from(p.dark_raw) - f64::from(p.light_raw);
        (f64::from(p.light_raw) + span * intensity).round() as u16
    }

    fn refresh_motion_registers(&mut self) {
        let heading = (self.heading_deg() * 16.0).round() as u16 % 5760;
        let [lo, hi] = heading.to_le_bytes();
        self.regs[reg::EULER_DATA as usize] = lo;
        self.regs[reg::EULER_DATA as usize + 1] = hi;

        let z = ((-self.omega).to_degrees() * 16.0).round() as i16;
        let [lo, hi] = z.to_le_bytes();
        let gz = reg::GYR_DATA as usize + 4;
        self.regs[gz] = lo;
        self.regs[gz + 1] = hi;
    }

    fn has_fault(&self, f: SimFault) -> bool {
        self.faults.contains(&f)
    }
}

/// Handle on the simulated world. Cheap to clone; every device handed out
/// shares the same state.
#[derive(Clone)]
pub struct SimRobot {
    world: Arc<Mutex<World>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for SimRobot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimRobot")
            .field("pose", &self.pose())
            .finish()
    }
}

impl SimRobot {
    pub fn new<C: Clock + Send + Sync + 'static>(params: SimParams, clock: C) -> Self {
        let last = clock.now();
        let mut regs = [0u8; reg::SPACE];
        regs[reg::CHIP_ID as usize] = reg::CHIP_ID_VALUE;
        regs[reg::CALIB_STAT as usize] = 0xFF;
        let mut world = World {
            params,
            last,
            x: 0.0,
            y: params.initial_offset_m,
            theta: -params.initial_heading_deg.to_radians(),
            omega: 0.0,
            wheel_ticks: [0.0; 2],
            effort: [0.0; 2],
            enabled: [false; 2],
            bank_power: [false; 2],
            surface: Surface::Track,
            regs,
            mode_writes: Vec::new(),
            faults: Vec::new(),
            bumped: false,
            bump_hooks: Vec::new(),
        };
        world.refresh_motion_registers();
        info!(sensors = params.sensors, "simulated robot ready");
        Self {
            world: Arc::new(Mutex::new(world)),
            clock: Arc::new(clock),
        }
    }

    fn synced(&self) -> HwResult<MutexGuard<'_, World>> {
        let mut w = self
            .world
            .lock()
            .map_err(|_| HwError::Sim("world lock poisoned".into()))?;
        w.integrate(self.clock.now());
        Ok(w)
    }

    fn peek(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Like `peek`, but with the world advanced to the current clock time.
    fn advanced(&self) -> MutexGuard<'_, World> {
        let mut w = self.peek();
        w.integrate(self.clock.now());
        w
    }

    pub fn params(&self) -> SimParams {
        self.peek().params
    }

    pub fn left_encoder(&self) -> SimCounter {
        SimCounter {
            robot: self.clone(),
            side: Side::Left,
        }
    }

    pub fn right_encoder(&self) -> SimCounter {
        SimCounter {
            robot: self.clone(),
            side: Side::Right,
        }
    }

    /// One analog channel per line sensor, left to right.
    pub fn line_sensors(&self) -> Vec<SimAnalog> {
        (0..self.params().sensors)
            .map(|index| SimAnalog {
                robot: self.clone(),
                index,
            })
            .collect()
    }

    /// Enable lines for the (even, odd) sensor banks.
    pub fn line_enables(&self) -> (SimOutput, SimOutput) {
        (
            SimOutput {
                robot: self.clone(),
                bank: 0,
            },
            SimOutput {
                robot: self.clone(),
                bank: 1,
            },
        )
    }

    pub fn imu(&self) -> SimImu {
        SimImu {
            robot: self.clone(),
        }
    }

    pub fn motor(&self, side: Side) -> SimMotor {
        SimMotor {
            robot: self.clone(),
            side,
            applied: 0.0,
        }
    }

    /// Register a callback fired once when the robot reaches the obstacle.
    pub fn on_bump<F: FnMut() + Send + 'static>(&self, hook: F) {
        self.peek().bump_hooks.push(Box::new(hook));
    }

    pub fn pose(&self) -> SimPose {
        let w = self.advanced();
        SimPose {
            x_m: w.x,
            y_m: w.y,
            heading_deg: w.heading_deg(),
        }
    }

    /// Signed effort currently applied to a wheel.
    pub fn wheel_effort(&self, side: Side) -> f64 {
        self.peek().effort[side.idx()]
    }

    /// Power state of the (even, odd) sensor banks.
    pub fn bank_power(&self) -> (bool, bool) {
        let w = self.peek();
        (w.bank_power[0], w.bank_power[1])
    }

    /// Every value written to the operating-mode register, in order.
    pub fn mode_writes(&self) -> Vec<u8> {
        self.peek().mode_writes.clone()
    }

    pub fn set_fault(&self, fault: SimFault, active: bool) {
        let mut w = self.peek();
        w.faults.retain(|f| *f != fault);
        if active {
            w.faults.push(fault);
        }
    }

    pub fn set_chip_id(&self, id: u8) {
        self.peek().regs[reg::CHIP_ID as usize] = id;
    }

    pub fn set_surface(&self, surface: Surface) {
        self.peek().surface = surface;
    }

    /// Teleport the robot sideways without touching wheel state.
    pub fn set_heading_deg(&self, heading: f64) {
        let mut w = self.peek();
        w.theta = -heading.to_radians();
        w.refresh_motion_registers();
    }

    /// Overwrite a raw wheel counter position.
    pub fn set_count(&self, side: Side, count: u16) {
        let mut w = self.peek();
        let base = i64::from(w.params.initial_count);
        w.wheel_ticks[side.idx()] = (i64::from(count) - base) as f64;
    }
}

pub struct SimCounter {
    robot: SimRobot,
    side: Side,
}

impl TickCounter for SimCounter {
    fn count(&mut self) -> HwResult<u16> {
        let w = self.robot.synced()?;
        if w.has_fault(SimFault::Counter) {
            return Err(Box::new(HwError::Sim("counter read failed".into())));
        }
        Ok(w.count(self.side.idx()))
    }
}

pub struct SimAnalog {
    robot: SimRobot,
    index: usize,
}

impl AnalogInput for SimAnalog {
    fn read(&mut self) -> HwResult<u16> {
        let w = self.robot.synced()?;
        if w.has_fault(SimFault::Adc) {
            return Err(Box::new(HwError::Sim(format!(
                "adc channel {} read failed",
                self.index
            ))));
        }
        let raw = w.reflectance(self.index);
        trace!(channel = self.index, raw, "sim adc");
        Ok(raw)
    }
}

pub struct SimOutput {
    robot: SimRobot,
    bank: usize,
}

impl DigitalOutput for SimOutput {
    fn set_high(&mut self) -> HwResult<()> {
        self.robot.synced()?.bank_power[self.bank] = true;
        Ok(())
    }

    fn set_low(&mut self) -> HwResult<()> {
        self.robot.synced()?.bank_power[self.bank] = false;
        Ok(())
    }
}

/// Register store emulating a BNO055 on I2C.
pub struct SimImu {
    robot: SimRobot,
}

impl RegisterBus for SimImu {
    fn read(&mut self, register: u8, buf: &mut [u8]) -> HwResult<()> {
        let mut w = self.robot.synced()?;
        if w.has_fault(SimFault::Bus) {
            return Err(Box::new(HwError::I2c("read not acknowledged".into())));
        }
        let start = usize::from(register);
        let end = start + buf.len();
        if end > reg::SPACE {
            return Err(Box::new(HwError::I2c(format!(
                "read past register space (0x{register:02X} + {})",
                buf.len()
            ))));
        }
        w.refresh_motion_registers();
        buf.copy_from_slice(&w.regs[start..end]);
        Ok(())
    }

    fn write(&mut self, register: u8, data: &[u8]) -> HwResult<()> {
        let mut w = self.robot.synced()?;
        if w.has_fault(SimFault::Bus) {
            return Err(Box::new(HwError::I2c("write not acknowledged".into())));
        }
        let start = usize::from(register);
        let end = start + data.len();
        if end > reg::SPACE {
            return Err(Box::new(HwError::I2c(format!(
                "write past register space (0x{register:02X} + {})",
                data.len()
            ))));
        }
        if register == reg::OPR_MODE
            && let Some(&mode) = data.first()
        {
            w.mode_writes.push(mode);
        }
        w.regs[start..end].copy_from_slice(data);
        Ok(())
    }
}

pub struct SimMotor {
    robot: SimRobot,
    side: Side,
    applied: f64,
}

impl Motor for SimMotor {
    fn enable(&mut self) -> HwResult<()> {
        self.robot.synced()?.enabled[self.side.idx()] = true;
        Ok(())
    }

    fn disable(&mut self) -> HwResult<()> {
        let mut w = self.robot.synced()?;
        w.enabled[self.side.idx()] = false;
        w.effort[self.side.idx()] = 0.0;
        self.applied = 0.0;
        Ok(())
    }

    fn set_effort(&mut self, effort: f64) -> HwResult<()> {
        let mut w = self.robot.synced()?;
        let clamped = clamp_effort(effort, w.params.max_effort);
        w.effort[self.side.idx()] = clamped;
        self.applied = clamped.abs();
        Ok(())
    }

    fn effort(&self) -> f64 {
        self.applied
    }
}
