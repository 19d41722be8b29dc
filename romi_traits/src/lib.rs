//! Hardware seams for the robot: everything the sensing/control core reads
//! from or writes to goes through one of these traits.
//!
//! Errors cross the boundary as `Box<dyn Error + Send + Sync>`; the core maps
//! them to its own typed errors.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Free-running 16-bit hardware tick counter (quadrature timer).
///
/// The counter wraps at 65536 and is never reset by its reader.
pub trait TickCounter {
    fn count(&mut self) -> HwResult<u16>;
}

/// A single analog channel returning raw ADC counts.
pub trait AnalogInput {
    fn read(&mut self) -> HwResult<u16>;
}

/// A push-pull digital output line.
pub trait DigitalOutput {
    fn set_high(&mut self) -> HwResult<()>;
    fn set_low(&mut self) -> HwResult<()>;
}

/// Register-addressable device: synchronous N-byte transfers starting at `reg`.
pub trait RegisterBus {
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> HwResult<()>;
    fn write(&mut self, reg: u8, data: &[u8]) -> HwResult<()>;
}

/// Sticky single-bit contact sensor.
///
/// `is_triggered` stays true from the first hit until `reset`.
pub trait BumpSensor {
    fn is_triggered(&self) -> bool;
    fn reset(&self);
}

/// Drive motor taking a signed effort in percent (-100..=100).
///
/// Implementations clamp to their own safe sub-range.
pub trait Motor {
    fn enable(&mut self) -> HwResult<()>;
    fn disable(&mut self) -> HwResult<()>;
    fn set_effort(&mut self, effort: f64) -> HwResult<()>;
    /// Magnitude of the effort actually applied by the last `set_effort`.
    fn effort(&self) -> f64;
}

impl<T: BumpSensor + ?Sized> BumpSensor for Box<T> {
    fn is_triggered(&self) -> bool {
        (**self).is_triggered()
    }

    fn reset(&self) {
        (**self).reset();
    }
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn enable(&mut self) -> HwResult<()> {
        (**self).enable()
    }

    fn disable(&mut self) -> HwResult<()> {
        (**self).disable()
    }

    fn set_effort(&mut self, effort: f64) -> HwResult<()> {
        (**self).set_effort(effort)
    }

    fn effort(&self) -> f64 {
        (**self).effort()
    }
}

impl<T: TickCounter + ?Sized> TickCounter for Box<T> {
    fn count(&mut self) -> HwResult<u16> {
        (**self).count()
    }
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read(&mut self) -> HwResult<u16> {
        (**self).read()
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn set_high(&mut self) -> HwResult<()> {
        (**self).set_high()
    }

    fn set_low(&mut self) -> HwResult<()> {
        (**self).set_low()
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for Box<T> {
    fn read(&mut self, reg: u8, buf: &mut [u8]) -> HwResult<()> {
        (**self).read(reg, buf)
    }

    fn write(&mut self, reg: u8, data: &[u8]) -> HwResult<()> {
        (**self).write(reg, data)
    }
}
