//! Hardware assembly: one set of boxed devices, simulated or real.

use std::time::Duration;

use romi_config::Config;
use romi_core::bump::{BumpArray, BumpFlag};
use romi_core::error::Result;
use romi_hardware::{Side, SimParams, SimRobot, Surface};
use romi_traits::{AnalogInput, DigitalOutput, Motor, RegisterBus, TickCounter};

pub struct Robot {
    pub left_encoder: Box<dyn TickCounter>,
    pub right_encoder: Box<dyn TickCounter>,
    pub line_sensors: Vec<Box<dyn AnalogInput>>,
    pub line_even: Box<dyn DigitalOutput>,
    pub line_odd: Box<dyn DigitalOutput>,
    pub imu: Box<dyn RegisterBus>,
    pub left_motor: Box<dyn Motor>,
    pub right_motor: Box<dyn Motor>,
    pub bumpers: BumpArray<BumpFlag>,
    /// Present only on the simulator; lets calibration swap reference surfaces.
    pub sim: Option<SimRobot>,
    /// Interrupt registrations that must outlive the run.
    _keep_alive: Vec<Box<dyn std::any::Any>>,
}

/// Ask for (or, in simulation, produce) a reference surface under the array.
pub fn present_surface(sim: Option<&SimRobot>, surface: Surface, pause: Duration) {
    if let Some(sim) = sim {
        sim.set_surface(surface);
        return;
    }
    let what = match surface {
        Surface::Dark => "the dark reference surface",
        Surface::Light => "the light reference surface",
        Surface::Track => "the track",
    };
    eprintln!("Place the sensor array over {what}...");
    std::thread::sleep(pause);
}

/// Open the configured backend: real hardware with the `hardware` feature,
/// the simulator otherwise.
pub fn open(cfg: &Config) -> Result<Robot> {
    #[cfg(feature = "hardware")]
    {
        open_hardware(cfg)
    }
    #[cfg(not(feature = "hardware"))]
    {
        Ok(open_sim(cfg))
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse::<f64>().ok())
}

fn env_u8(key: &str) -> Option<u8> {
    let v = std::env::var(key).ok()?;
    match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => v.parse::<u8>().ok(),
    }
}

/// Simulator wired per the config. Test hooks:
/// - `ROMI_SIM_OBSTACLE_M`: distance to an obstacle that fires every bumper
/// - `ROMI_SIM_OFFSET_M`: starting lateral offset from the line
/// - `ROMI_SIM_CHIP_ID`: chip id reported by the orientation sensor
#[cfg_attr(feature = "hardware", allow(dead_code))]
pub fn open_sim(cfg: &Config) -> Robot {
    let mut params = SimParams {
        sensors: cfg.pins.line_channels.len(),
        ticks_per_rev: f64::from(cfg.encoder.ticks_per_rev),
        max_effort: cfg.control.max_effort,
        obstacle_m: env_f64("ROMI_SIM_OBSTACLE_M"),
        ..SimParams::default()
    };
    if let Some(offset) = env_f64("ROMI_SIM_OFFSET_M") {
        params.initial_offset_m = offset;
    }
    let sim = SimRobot::new(params, romi_traits::MonotonicClock::new());
    if let Some(id) = env_u8("ROMI_SIM_CHIP_ID") {
        sim.set_chip_id(id);
    }

    let flags: Vec<BumpFlag> = (0..cfg.pins.bumpers.len().max(1))
        .map(|_| BumpFlag::new())
        .collect();
    let hooks = flags.clone();
    sim.on_bump(move || {
        for f in &hooks {
            f.trigger();
        }
    });

    let (even, odd) = sim.line_enables();
    Robot {
        left_encoder: Box::new(sim.left_encoder()),
        right_encoder: Box::new(sim.right_encoder()),
        line_sensors: sim
            .line_sensors()
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn AnalogInput>)
            .collect(),
        line_even: Box::new(even),
        line_odd: Box::new(odd),
        imu: Box::new(sim.imu()),
        left_motor: Box::new(sim.motor(Side::Left)),
        right_motor: Box::new(sim.motor(Side::Right)),
        bumpers: BumpArray::new(flags),
        sim: Some(sim),
        _keep_alive: Vec::new(),
    }
}

#[cfg(feature = "hardware")]
fn open_hardware(cfg: &Config) -> Result<Robot> {
    use eyre::WrapErr;
    use romi_hardware::bno055::I2cRegisterBus;
    use romi_hardware::gpio::{self, DriverMotor, GpioOutput, InterruptBumper, QuadratureCounter};
    use romi_hardware::mcp3008::Mcp3008;

    let p = &cfg.pins;
    let gpio = gpio::open().wrap_err("open gpio")?;
    let adc = Mcp3008::new().wrap_err("open line sensor adc")?;

    let mut keep: Vec<Box<dyn std::any::Any>> = Vec::new();
    let mut flags = Vec::with_capacity(p.bumpers.len());
    for &pin in &p.bumpers {
        let flag = BumpFlag::new();
        let isr = flag.clone();
        let bumper = InterruptBumper::new(&gpio, pin, move || isr.trigger())
            .wrap_err_with(|| format!("open bumper pin {pin}"))?;
        keep.push(Box::new(bumper));
        flags.push(flag);
    }

    let max = cfg.control.max_effort;
    Ok(Robot {
        left_encoder: Box::new(
            QuadratureCounter::new(&gpio, p.left_enc_a, p.left_enc_b)
                .wrap_err("open left encoder pins")?,
        ),
        right_encoder: Box::new(
            QuadratureCounter::new(&gpio, p.right_enc_a, p.right_enc_b)
                .wrap_err("open right encoder pins")?,
        ),
        line_sensors: p
            .line_channels
            .iter()
            .map(|&ch| Box::new(adc.channel(ch)) as Box<dyn AnalogInput>)
            .collect(),
        line_even: Box::new(GpioOutput::new(&gpio, p.line_even).wrap_err("open line enable pins")?),
        line_odd: Box::new(GpioOutput::new(&gpio, p.line_odd).wrap_err("open line enable pins")?),
        imu: Box::new(
            I2cRegisterBus::new(cfg.imu.i2c_bus, cfg.imu.address).wrap_err("open imu bus")?,
        ),
        left_motor: Box::new(
            DriverMotor::new(&gpio, p.left_pwm, p.left_dir, p.left_sleep, max)
                .wrap_err("open motor pins")?,
        ),
        right_motor: Box::new(
            DriverMotor::new(&gpio, p.right_pwm, p.right_dir, p.right_sleep, max)
                .wrap_err("open motor pins")?,
        ),
        bumpers: BumpArray::new(flags),
        sim: None,
        _keep_alive: keep,
    })
}
