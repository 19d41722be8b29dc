//! Heading from a register-addressable 9-DOF fusion sensor (BNO055 map).
//!
//! Construction verifies the chip identity, then walks the device from
//! configuration mode into NDOF fusion mode with the settle delays the
//! datasheet requires. Mode changes are only valid from configuration mode,
//! so the order is fixed.
//!
//! Headings are reported relative to a stored offset and wrapped into
//! [0, 360); errors against a target are the signed minimal rotation in
//! [-180, 180].

use romi_traits::{Clock, RegisterBus};
use tracing::{debug, info};

use crate::calibration::{CalibrationStatus, IMU_CALIBRATION_LEN, ImuCalibration};
use crate::config::ImuCfg;
use crate::error::{HeadingError, Result};
use crate::hw_error::lift;
use crate::util::{FULL_TURN_DEG, wrap_degrees};

/// Register map and mode values.
pub mod reg {
    pub const CHIP_ID: u8 = 0x00;
    pub const OPR_MODE: u8 = 0x3D;
    pub const CALIB_STAT: u8 = 0x35;
    /// Heading LSB; roll and pitch follow at +2 and +4.
    pub const EULER_DATA: u8 = 0x1A;
    pub const GYR_DATA: u8 = 0x14;
    pub const CALIB_DATA: u8 = 0x55;

    pub const EXPECTED_CHIP_ID: u8 = 0xA0;
    pub const MODE_CONFIG: u8 = 0x00;
    pub const MODE_NDOF: u8 = 0x0C;

    pub const DEFAULT_ADDRESS: u8 = 0x28;
}

/// Euler angle resolution: 16 LSB per degree.
const EULER_LSB_PER_DEG: f64 = 16.0;

/// Wrap `raw - offset` into [0, 360).
#[inline]
pub fn corrected_heading(raw: f64, offset: f64) -> f64 {
    wrap_degrees(raw - offset + FULL_TURN_DEG)
}

/// Signed minimal rotation from `target` to `heading`, in [-180, 180].
#[inline]
pub fn heading_error(heading: f64, target: f64) -> f64 {
    let half = FULL_TURN_DEG / 2.0;
    wrap_degrees(heading - target + half) - half
}

pub struct HeadingCorrector<B: RegisterBus, C: Clock> {
    bus: B,
    clock: C,
    cfg: ImuCfg,
    offset: f64,
}

impl<B: RegisterBus, C: Clock> core::fmt::Debug for HeadingCorrector<B, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HeadingCorrector")
            .field("offset", &self.offset)
            .finish()
    }
}

impl<B: RegisterBus, C: Clock> HeadingCorrector<B, C> {
    /// Verify the device and bring it up in 9-DOF fusion mode.
    ///
    /// A chip-id mismatch is fatal and leaves the device untouched.
    pub fn new(bus: B, clock: C, cfg: ImuCfg) -> Result<Self> {
        let mut this = Self {
            bus,
            clock,
            cfg,
            offset: 0.0,
        };
        let found = this.read_u8(reg::CHIP_ID, "reading chip id")?;
        if found != reg::EXPECTED_CHIP_ID {
            return Err(eyre::Report::new(HeadingError::ChipIdMismatch {
                expected: reg::EXPECTED_CHIP_ID,
                found,
            }));
        }
        this.set_mode(reg::MODE_CONFIG)?;
        this.clock.sleep(this.cfg.config_settle);
        this.set_mode(reg::MODE_NDOF)?;
        this.clock.sleep(this.cfg.fusion_settle);
        info!("orientation sensor in NDOF fusion mode");
        Ok(this)
    }

    fn read_u8(&mut self, register: u8, what: &'static str) -> Result<u8> {
        let mut buf = [0u8; 1];
        lift(self.bus.read(register, &mut buf), what)?;
        Ok(buf[0])
    }

    /// Write the operating mode and wait for the switch to take effect.
    pub fn set_mode(&mut self, mode: u8) -> Result<()> {
        lift(self.bus.write(reg::OPR_MODE, &[mode]), "writing operating mode")?;
        self.clock.sleep(self.cfg.mode_switch);
        debug!(mode, "operating mode set");
        Ok(())
    }

    /// Raw fused heading in degrees (1/16 degree resolution).
    ///
    /// Roll and pitch sit in the following registers but are not decoded.
    pub fn read_euler_angles(&mut self) -> Result<f64> {
        let mut buf = [0u8; 2];
        lift(self.bus.read(reg::EULER_DATA, &mut buf), "reading heading")?;
        Ok(f64::from(u16::from_le_bytes(buf)) / EULER_LSB_PER_DEG)
    }

    /// Angular velocity (x, y, z) in degrees per second.
    pub fn read_angular_velocity(&mut self) -> Result<(f64, f64, f64)> {
        let mut buf = [0u8; 6];
        lift(self.bus.read(reg::GYR_DATA, &mut buf), "reading gyroscope")?;
        let scale = self.cfg.gyro_scale;
        let axis = |i: usize| f64::from(u16::from_le_bytes([buf[i], buf[i + 1]])) / scale;
        Ok((axis(0), axis(2), axis(4)))
    }

    /// Take the current raw heading as the zero reference and return it.
    pub fn set_offset(&mut self) -> Result<f64> {
        self.offset = self.read_euler_angles()?;
        debug!(offset = self.offset, "heading offset captured");
        Ok(self.offset)
    }

    /// Restore a previously captured zero reference.
    pub fn set_offset_to(&mut self, offset_deg: f64) {
        self.offset = offset_deg;
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Heading relative to the offset, in [0, 360).
    pub fn corrected_heading(&mut self) -> Result<f64> {
        let raw = self.read_euler_angles()?;
        Ok(corrected_heading(raw, self.offset))
    }

    /// Signed minimal rotation from `target` to the corrected heading.
    pub fn heading_error(&mut self, target: f64) -> Result<f64> {
        let heading = self.corrected_heading()?;
        Ok(heading_error(heading, target))
    }

    pub fn calibration_status(&mut self) -> Result<CalibrationStatus> {
        let status = self.read_u8(reg::CALIB_STAT, "reading calibration status")?;
        Ok(CalibrationStatus::from_register(status))
    }

    pub fn calibration_coefficients(&mut self) -> Result<ImuCalibration> {
        let mut buf = [0u8; IMU_CALIBRATION_LEN];
        lift(
            self.bus.read(reg::CALIB_DATA, &mut buf),
            "reading calibration coefficients",
        )?;
        Ok(ImuCalibration(buf))
    }

    /// Write a coefficient block; anything but exactly 22 bytes is rejected
    /// before touching the bus.
    pub fn set_calibration_coefficients(&mut self, coeffs: &[u8]) -> Result<()> {
        let block = ImuCalibration::try_from(coeffs).map_err(eyre::Report::new)?;
        lift(
            self.bus.write(reg::CALIB_DATA, block.as_bytes()),
            "writing calibration coefficients",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrected_wraps_past_zero() {
        assert_eq!(corrected_heading(10.0, 350.0), 20.0);
        assert_eq!(corrected_heading(350.0, 10.0), 340.0);
        assert_eq!(corrected_heading(90.0, 90.0), 0.0);
    }

    #[test]
    fn error_takes_short_way() {
        assert_eq!(heading_error(350.0, 10.0), -20.0);
        assert_eq!(heading_error(10.0, 350.0), 20.0);
        assert_eq!(heading_error(90.0, 90.0), 0.0);
    }

    #[test]
    fn opposite_heading_is_minus_half_turn() {
        assert_eq!(heading_error(180.0, 0.0), -180.0);
    }
}
