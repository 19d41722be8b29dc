//! Reflectance line-sensor array: calibration, normalization, centroid.
//!
//! The array is powered through two enable lines (even and odd banks) only
//! while it is being read. Raw readings are normalized per sensor against a
//! dark and a light baseline captured during calibration, then reduced to a
//! weighted centroid of 1-based sensor positions.
//!
//! Numeric degeneracy never produces an error:
//! - a sensor whose dark and light baselines are equal (or missing) reads 0.5
//! - an all-zero normalized array yields the "line lost" sentinel `N + 1`

use romi_traits::{AnalogInput, Clock, DigitalOutput};
use tracing::{debug, trace, warn};

use crate::calibration::LineCalibration;
use crate::config::LineCfg;
use crate::error::{BuildError, Result};
use crate::hw_error::lift;
use crate::util::round_to_digits;

/// Normalized value reported for a sensor with a degenerate calibration.
pub const NEUTRAL_READING: f64 = 0.5;

/// Normalize one raw reading against its dark/light baselines.
///
/// Computes `(raw - light) / (dark - light)` rounded to `digits` decimals and
/// saturated to [0, 1]. Equal baselines give exactly [`NEUTRAL_READING`].
pub fn normalize_reading(raw: u16, dark: u16, light: u16, digits: u32) -> f64 {
    let span = f64::from(dark) - f64::from(light);
    if span == 0.0 {
        return NEUTRAL_READING;
    }
    let v = round_to_digits((f64::from(raw) - f64::from(light)) / span, digits);
    v.clamp(0.0, 1.0)
}

/// Weighted centroid of 1-based sensor positions.
///
/// Returns `lost` when the values sum to exactly zero.
pub fn centroid_of(values: &[f64], lost: f64) -> f64 {
    let total: f64 = values.iter().sum();
    if total == 0.0 {
        return lost;
    }
    let weighted: f64 = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    weighted / total
}

pub struct LineCentroidEstimator<A: AnalogInput, E: DigitalOutput, C: Clock> {
    sensors: Vec<A>,
    even: E,
    odd: E,
    clock: C,
    cfg: LineCfg,
    raw: Vec<u16>,
    normalized: Vec<f64>,
    calibration: LineCalibration,
}

impl<A: AnalogInput, E: DigitalOutput, C: Clock> core::fmt::Debug
    for LineCentroidEstimator<A, E, C>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LineCentroidEstimator")
            .field("sensors", &self.sensors.len())
            .field("raw", &self.raw)
            .field("normalized", &self.normalized)
            .finish()
    }
}

impl<A: AnalogInput, E: DigitalOutput, C: Clock> LineCentroidEstimator<A, E, C> {
    /// Build an estimator over `sensors` in physical order.
    pub fn new(sensors: Vec<A>, even: E, odd: E, clock: C, cfg: LineCfg) -> Result<Self> {
        if sensors.is_empty() {
            return Err(eyre::Report::new(BuildError::NoSensors));
        }
        let n = sensors.len();
        Ok(Self {
            sensors,
            even,
            odd,
            clock,
            cfg,
            raw: vec![0; n],
            normalized: Vec::with_capacity(n),
            calibration: LineCalibration::default(),
        })
    }

    /// Number of sensors in the array.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Centroid reported when no sensor sees the line.
    pub fn lost_sentinel(&self) -> f64 {
        (self.sensors.len() + 1) as f64
    }

    /// Centroid of a perfectly centered line.
    pub fn center(&self) -> f64 {
        (self.sensors.len() + 1) as f64 / 2.0
    }

    /// Power both sensor banks.
    pub fn enable(&mut self) -> Result<()> {
        lift(self.even.set_high(), "enabling even sensor bank")?;
        lift(self.odd.set_high(), "enabling odd sensor bank")
    }

    /// Power down both sensor banks.
    pub fn disable(&mut self) -> Result<()> {
        lift(self.even.set_low(), "disabling even sensor bank")?;
        lift(self.odd.set_low(), "disabling odd sensor bank")
    }

    /// Power the array, let it settle, read every channel, power it down.
    ///
    /// The raw sequence is replaced in place. The banks are switched off even
    /// when a channel read fails.
    pub fn read_array(&mut self) -> Result<()> {
        self.enable()?;
        self.clock.sleep(self.cfg.read_settle);
        let read = self.read_channels();
        let off = self.disable();
        read?;
        off?;
        trace!(raw = ?self.raw, "line array read");
        Ok(())
    }

    fn read_channels(&mut self) -> Result<()> {
        for (slot, sensor) in self.raw.iter_mut().zip(self.sensors.iter_mut()) {
            *slot = lift(sensor.read(), "reading line sensor")?;
        }
        Ok(())
    }

    /// Capture the dark baseline and return it.
    pub fn calibrate_dark(&mut self) -> Result<&[u16]> {
        let raw = self.capture()?;
        self.calibration.dark = raw;
        debug!(dark = ?self.calibration.dark, "dark calibration captured");
        self.warn_degenerate();
        Ok(&self.calibration.dark)
    }

    /// Capture the light baseline and return it.
    pub fn calibrate_light(&mut self) -> Result<&[u16]> {
        let raw = self.capture()?;
        self.calibration.light = raw;
        debug!(light = ?self.calibration.light, "light calibration captured");
        self.warn_degenerate();
        Ok(&self.calibration.light)
    }

    fn capture(&mut self) -> Result<Vec<u16>> {
        self.enable()?;
        self.clock.sleep(self.cfg.calibrate_settle);
        let read = self.read_array();
        let off = self.disable();
        read?;
        off?;
        Ok(self.raw.clone())
    }

    fn warn_degenerate(&self) {
        if !self.calibration.is_complete(self.sensors.len()) {
            return;
        }
        for i in self.calibration.degenerate_channels() {
            warn!(sensor = i, "dark and light baselines are equal; sensor will read neutral");
        }
    }

    /// Normalize the latest raw sequence against the calibration.
    ///
    /// Sensors without both baselines read neutral.
    pub fn normalize(&mut self) {
        let digits = self.cfg.round_digits;
        let cal = &self.calibration;
        self.normalized.clear();
        self.normalized
            .extend(self.raw.iter().enumerate().map(|(i, &raw)| {
                match (cal.dark.get(i), cal.light.get(i)) {
                    (Some(&dark), Some(&light)) => normalize_reading(raw, dark, light, digits),
                    _ => NEUTRAL_READING,
                }
            }));
    }

    /// Read and normalize; the per-cycle entry point.
    pub fn update_ir(&mut self) -> Result<&[f64]> {
        self.read_array()?;
        self.normalize();
        Ok(&self.normalized)
    }

    /// Latest normalized sequence (empty before the first normalization).
    pub fn normalized(&self) -> &[f64] {
        &self.normalized
    }

    /// Latest raw sequence.
    pub fn raw(&self) -> &[u16] {
        &self.raw
    }

    /// Weighted centroid of the latest normalized sequence, or
    /// [`lost_sentinel`](Self::lost_sentinel) when it sums to zero.
    pub fn centroid(&self) -> f64 {
        centroid_of(&self.normalized, self.lost_sentinel())
    }

    pub fn calibration(&self) -> &LineCalibration {
        &self.calibration
    }

    /// Restore previously captured baselines.
    pub fn set_calibration(&mut self, calibration: LineCalibration) -> Result<()> {
        let n = self.sensors.len();
        if !calibration.dark.is_empty() && calibration.dark.len() != n {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "dark calibration length does not match sensor count",
            )));
        }
        if !calibration.light.is_empty() && calibration.light.len() != n {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "light calibration length does not match sensor count",
            )));
        }
        self.calibration = calibration;
        self.warn_degenerate();
        Ok(())
    }
}
