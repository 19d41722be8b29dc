//! Calibration data owned by the estimators.

use crate::error::HeadingError;

/// Length of the orientation sensor's calibration coefficient block.
pub const IMU_CALIBRATION_LEN: usize = 22;

/// Per-sensor raw baselines captured over two reference surfaces.
///
/// Either side may be empty until its calibration pass has run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCalibration {
    pub dark: Vec<u16>,
    pub light: Vec<u16>,
}

impl LineCalibration {
    pub fn new(dark: Vec<u16>, light: Vec<u16>) -> Self {
        Self { dark, light }
    }

    /// Both baselines are present for all `n` sensors.
    pub fn is_complete(&self, n: usize) -> bool {
        self.dark.len() == n && self.light.len() == n
    }

    /// Indices whose dark and light baselines coincide.
    pub fn degenerate_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.dark
            .iter()
            .zip(self.light.iter())
            .enumerate()
            .filter(|(_, (d, l))| d == l)
            .map(|(i, _)| i)
    }
}

/// Opaque calibration coefficient block of the orientation sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImuCalibration(pub [u8; IMU_CALIBRATION_LEN]);

impl ImuCalibration {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ImuCalibration {
    type Error = HeadingError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let block: [u8; IMU_CALIBRATION_LEN] =
            bytes
                .try_into()
                .map_err(|_| HeadingError::CalibrationLength {
                    expected: IMU_CALIBRATION_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(block))
    }
}

/// Self-reported calibration quality, each score in 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationStatus {
    pub sys: u8,
    pub gyro: u8,
    pub accel: u8,
    pub mag: u8,
}

impl CalibrationStatus {
    /// Unpack the status register: sys(7:6) gyro(5:4) accel(3:2) mag(1:0).
    pub fn from_register(status: u8) -> Self {
        Self {
            sys: (status >> 6) & 0x03,
            gyro: (status >> 4) & 0x03,
            accel: (status >> 2) & 0x03,
            mag: status & 0x03,
        }
    }

    /// Every sub-system reports full calibration.
    pub fn is_fully_calibrated(&self) -> bool {
        self.sys == 3 && self.gyro == 3 && self.accel == 3 && self.mag == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacks_status_fields() {
        let s = CalibrationStatus::from_register(0b11_10_01_00);
        assert_eq!(
            s,
            CalibrationStatus {
                sys: 3,
                gyro: 2,
                accel: 1,
                mag: 0
            }
        );
        assert!(!s.is_fully_calibrated());
        assert!(CalibrationStatus::from_register(0xFF).is_fully_calibrated());
    }

    #[test]
    fn imu_block_must_be_22_bytes() {
        assert!(ImuCalibration::try_from(&[0u8; 22][..]).is_ok());
        assert_eq!(
            ImuCalibration::try_from(&[0u8; 21][..]),
            Err(HeadingError::CalibrationLength {
                expected: 22,
                actual: 21
            })
        );
    }

    #[test]
    fn finds_degenerate_channels() {
        let cal = LineCalibration::new(vec![900, 500, 700], vec![100, 500, 100]);
        assert!(cal.is_complete(3));
        assert!(!cal.is_complete(4));
        assert_eq!(cal.degenerate_channels().collect::<Vec<_>>(), vec![1]);
    }
}
