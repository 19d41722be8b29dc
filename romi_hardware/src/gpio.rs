//! Raspberry Pi GPIO devices: enable lines, software quadrature counters,
//! bump switches, and PWM motor drivers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU16, Ordering};

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use romi_traits::{DigitalOutput, HwResult, Motor, TickCounter};
use tracing::{debug, warn};

use crate::error::{HwError, Result};
use crate::util::clamp_effort;

const PWM_FREQUENCY_HZ: f64 = 20_000.0;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

pub fn open() -> Result<Gpio> {
    Gpio::new().map_err(gpio_err)
}

pub struct GpioOutput {
    pin: OutputPin,
}

impl GpioOutput {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self> {
        let mut pin = gpio.get(pin).map_err(gpio_err)?.into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl DigitalOutput for GpioOutput {
    fn set_high(&mut self) -> HwResult<()> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> HwResult<()> {
        self.pin.set_low();
        Ok(())
    }
}

/// x4 decode: index is `(previous state << 2) | current state`, state = `A << 1 | B`.
const QUAD_STEP: [i8; 16] = [0, -1, 1, 0, 1, 0, 0, -1, -1, 0, 0, 1, 0, 1, -1, 0];

fn advance(state: &AtomicU8, count: &AtomicU16, bit: u8, level: Level) {
    let apply = |s: u8| if level == Level::High { s | bit } else { s & !bit };
    let prev = state
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| Some(apply(s)))
        .unwrap_or_else(|s| s);
    let next = apply(prev);
    match QUAD_STEP[usize::from((prev << 2) | next)] {
        1 => {
            count.fetch_add(1, Ordering::AcqRel);
        }
        -1 => {
            count.fetch_sub(1, Ordering::AcqRel);
        }
        _ => {}
    }
}

/// Free-running 16-bit counter fed by edge interrupts on both encoder phases.
pub struct QuadratureCounter {
    _a: InputPin,
    _b: InputPin,
    count: Arc<AtomicU16>,
}

impl QuadratureCounter {
    pub fn new(gpio: &Gpio, pin_a: u8, pin_b: u8) -> Result<Self> {
        let mut a = gpio.get(pin_a).map_err(gpio_err)?.into_input_pullup();
        let mut b = gpio.get(pin_b).map_err(gpio_err)?.into_input_pullup();
        let initial = (u8::from(a.is_high()) << 1) | u8::from(b.is_high());
        let state = Arc::new(AtomicU8::new(initial));
        let count = Arc::new(AtomicU16::new(0));

        let (s, c) = (state.clone(), count.clone());
        a.set_async_interrupt(Trigger::Both, move |level| advance(&s, &c, 0b10, level))
            .map_err(gpio_err)?;
        let (s, c) = (state, count.clone());
        b.set_async_interrupt(Trigger::Both, move |level| advance(&s, &c, 0b01, level))
            .map_err(gpio_err)?;
        debug!(pin_a, pin_b, "quadrature counter armed");
        Ok(Self {
            _a: a,
            _b: b,
            count,
        })
    }
}

impl TickCounter for QuadratureCounter {
    fn count(&mut self) -> HwResult<u16> {
        Ok(self.count.load(Ordering::Acquire))
    }
}

/// Active-low bump switch; `on_hit` runs on the interrupt thread.
pub struct InterruptBumper {
    _pin: InputPin,
}

impl InterruptBumper {
    pub fn new<F>(gpio: &Gpio, pin: u8, mut on_hit: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let mut input = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        input
            .set_async_interrupt(Trigger::FallingEdge, move |_| on_hit())
            .map_err(gpio_err)?;
        Ok(Self { _pin: input })
    }
}

/// DRV8838-style driver: software PWM on `pwm`, direction on `dir`, and an
/// active-low sleep line.
pub struct DriverMotor {
    pwm: OutputPin,
    dir: OutputPin,
    sleep: OutputPin,
    max_effort: f64,
    applied: f64,
}

impl DriverMotor {
    pub fn new(gpio: &Gpio, pwm: u8, dir: u8, sleep: u8, max_effort: f64) -> Result<Self> {
        let mut pwm = gpio.get(pwm).map_err(gpio_err)?.into_output();
        let mut dir = gpio.get(dir).map_err(gpio_err)?.into_output();
        let mut sleep = gpio.get(sleep).map_err(gpio_err)?.into_output();
        pwm.set_low();
        dir.set_low();
        sleep.set_low();
        Ok(Self {
            pwm,
            dir,
            sleep,
            max_effort,
            applied: 0.0,
        })
    }
}

impl Motor for DriverMotor {
    fn enable(&mut self) -> HwResult<()> {
        self.sleep.set_high();
        Ok(())
    }

    fn disable(&mut self) -> HwResult<()> {
        if let Err(e) = self.pwm.clear_pwm() {
            warn!(error = %e, "clearing pwm failed");
        }
        self.pwm.set_low();
        self.sleep.set_low();
        self.applied = 0.0;
        Ok(())
    }

    fn set_effort(&mut self, effort: f64) -> HwResult<()> {
        let effort = clamp_effort(effort, self.max_effort);
        if effort < 0.0 {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        let duty = effort.abs() / 100.0;
        if duty == 0.0 {
            self.pwm.clear_pwm().map_err(gpio_err)?;
            self.pwm.set_low();
        } else {
            self.pwm
                .set_pwm_frequency(PWM_FREQUENCY_HZ, duty)
                .map_err(gpio_err)?;
        }
        self.applied = effort.abs();
        Ok(())
    }

    fn effort(&self) -> f64 {
        self.applied
    }
}
