#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration persistence for the robot.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Line calibration can come from a strict-header CSV or a `[calibration]`
//!   TOML table; captured calibrations are written back atomically.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Length of the orientation sensor's calibration coefficient block.
pub const IMU_COEFFICIENTS_LEN: usize = 22;

/// Line calibration CSV schema.
///
/// Expected headers:
/// sensor,dark,light
///
/// Example:
/// sensor,dark,light
/// 0,3890,410
/// 1,3902,398
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub sensor: usize,
    pub dark: u16,
    pub light: u16,
}

/// BCM pin numbers and ADC channels. Ignored by the simulator but required so
/// a config file always describes a real wiring.
#[derive(Debug, Deserialize)]
pub struct Pins {
    pub left_enc_a: u8,
    pub left_enc_b: u8,
    pub right_enc_a: u8,
    pub right_enc_b: u8,
    /// ADC channel per line sensor, in physical order.
    pub line_channels: Vec<u8>,
    pub line_even: u8,
    pub line_odd: u8,
    #[serde(default)]
    pub bumpers: Vec<u8>,
    pub left_pwm: u8,
    pub left_dir: u8,
    pub left_sleep: u8,
    pub right_pwm: u8,
    pub right_dir: u8,
    pub right_sleep: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncoderCfg {
    pub ticks_per_rev: u32,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            ticks_per_rev: 1440,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LineCfg {
    /// Power-up settle before each array read (µs)
    pub read_settle_us: u64,
    /// Extra settle before a calibration capture (µs)
    pub calibrate_settle_us: u64,
    /// Decimal digits kept by normalization
    pub round_digits: u32,
}

impl Default for LineCfg {
    fn default() -> Self {
        Self {
            read_settle_us: 50,
            calibrate_settle_us: 200,
            round_digits: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImuCfg {
    /// 7-bit I2C address (0x28 or 0x29)
    pub address: u8,
    /// I2C bus number (hardware backend only)
    pub i2c_bus: u8,
    pub config_settle_ms: u64,
    pub fusion_settle_ms: u64,
    pub mode_switch_ms: u64,
    /// Raw gyroscope counts per deg/s
    pub gyro_scale: f64,
}

impl Default for ImuCfg {
    fn default() -> Self {
        Self {
            address: 0x28,
            i2c_bus: 1,
            config_settle_ms: 20,
            fusion_settle_ms: 30,
            mode_switch_ms: 30,
            gyro_scale: 16.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Fixed time step in seconds (ignored when `dynamic_dt`)
    pub dt_s: f64,
    pub reference: f64,
    /// Measure the time step between calls instead of using `dt_s`
    pub dynamic_dt: bool,
    /// Optional symmetric clamp on the integral term; absent = unbounded
    pub integral_limit: Option<f64>,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            dt_s: 0.015,
            reference: 0.0,
            dynamic_dt: false,
            integral_limit: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PidSet {
    /// Line centroid → differential effort
    pub line: PidCfg,
    /// Heading error → differential effort
    pub heading: PidCfg,
}

impl Default for PidSet {
    fn default() -> Self {
        Self {
            line: PidCfg {
                kp: 12.0,
                kd: 0.05,
                ..PidCfg::default()
            },
            heading: PidCfg {
                kp: 0.4,
                ..PidCfg::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Control loop period (ms)
    pub cycle_ms: u64,
    /// Forward effort shared by both wheels (percent)
    pub base_effort: f64,
    /// Motor driver hard clamp (percent)
    pub max_effort: f64,
    /// Add heading-hold correction on top of line following
    pub heading_hold: bool,
    /// Stop the run when any bumper fires
    pub stop_on_bump: bool,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            cycle_ms: 15,
            base_effort: 25.0,
            max_effort: 45.0,
            heading_hold: false,
            stop_on_bump: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Calibration captured by `romi calibrate`, restorable at startup.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PersistedCalibration {
    /// Raw line readings over the dark reference surface
    #[serde(default)]
    pub dark: Vec<u16>,
    /// Raw line readings over the light reference surface
    #[serde(default)]
    pub light: Vec<u16>,
    /// Heading zero reference in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_offset_deg: Option<f64>,
    /// Orientation sensor coefficient block (22 bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imu_coefficients: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct CalibrationFile {
    calibration: PersistedCalibration,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub line: LineCfg,
    #[serde(default)]
    pub imu: ImuCfg,
    #[serde(default)]
    pub pid: PidSet,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub logging: Logging,
    /// Optional persisted calibration; a `--calibration` file overrides it.
    #[serde(default)]
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_line_calibration_csv(path: &Path) -> eyre::Result<PersistedCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["sensor", "dark", "light"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'sensor,dark,light', got: {}",
            actual.join(",")
        );
    }

    let mut out = PersistedCalibration::default();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if row.sensor != idx {
            eyre::bail!(
                "calibration CSV row {} lists sensor {}, expected {} (rows must be in sensor order)",
                idx + 2,
                row.sensor,
                idx
            );
        }
        out.dark.push(row.dark);
        out.light.push(row.light);
    }
    if out.dark.is_empty() {
        eyre::bail!("calibration CSV has no rows");
    }
    Ok(out)
}

/// Read a TOML file holding a single `[calibration]` table.
pub fn load_calibration_toml(path: &Path) -> eyre::Result<PersistedCalibration> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read calibration file {:?}: {}", path, e))?;
    let file: CalibrationFile = toml::from_str(&text)
        .map_err(|e| eyre::eyre!("parse calibration file {:?}: {}", path, e))?;
    file.calibration.validate()?;
    Ok(file.calibration)
}

/// Load calibration by extension: `.csv` (line only) or TOML otherwise.
pub fn load_calibration(path: &Path) -> eyre::Result<PersistedCalibration> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => load_line_calibration_csv(path),
        _ => load_calibration_toml(path),
    }
}

/// Write a `[calibration]` table to `path` atomically (temp file + rename).
pub fn save_calibration(path: &Path, cal: &PersistedCalibration) -> eyre::Result<()> {
    cal.validate()?;
    let text = toml::to_string_pretty(&CalibrationFile {
        calibration: cal.clone(),
    })
    .map_err(|e| eyre::eyre!("serialize calibration: {}", e))?;
    let tmp = path.with_extension("new");
    {
        let mut f = std::fs::File::create(&tmp)
            .map_err(|e| eyre::eyre!("create {:?}: {}", tmp, e))?;
        f.write_all(text.as_bytes())?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).map_err(|e| eyre::eyre!("rename {:?} -> {:?}: {}", tmp, path, e))
}

impl PersistedCalibration {
    pub fn validate(&self) -> eyre::Result<()> {
        if !self.dark.is_empty() && !self.light.is_empty() && self.dark.len() != self.light.len()
        {
            eyre::bail!(
                "calibration.dark has {} entries but calibration.light has {}",
                self.dark.len(),
                self.light.len()
            );
        }
        if let Some(c) = &self.imu_coefficients
            && c.len() != IMU_COEFFICIENTS_LEN
        {
            eyre::bail!(
                "calibration.imu_coefficients must be {} bytes, got {}",
                IMU_COEFFICIENTS_LEN,
                c.len()
            );
        }
        if let Some(off) = self.heading_offset_deg
            && !(0.0..360.0).contains(&off)
        {
            eyre::bail!("calibration.heading_offset_deg must be in [0, 360)");
        }
        Ok(())
    }
}

impl PidCfg {
    fn validate(&self, name: &str) -> eyre::Result<()> {
        if !(self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()) {
            eyre::bail!("pid.{name} gains must be finite");
        }
        if !self.dynamic_dt && !(self.dt_s.is_finite() && self.dt_s >= 0.0) {
            eyre::bail!("pid.{name}.dt_s must be >= 0");
        }
        if let Some(limit) = self.integral_limit
            && !(limit.is_finite() && limit > 0.0)
        {
            eyre::bail!("pid.{name}.integral_limit must be > 0");
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        if self.pins.line_channels.is_empty() {
            eyre::bail!("pins.line_channels must list at least one sensor");
        }

        // Encoder
        if self.encoder.ticks_per_rev == 0 {
            eyre::bail!("encoder.ticks_per_rev must be > 0");
        }

        // Line
        if self.line.round_digits > 10 {
            eyre::bail!("line.round_digits must be <= 10");
        }
        if self.line.read_settle_us > 10_000 || self.line.calibrate_settle_us > 10_000 {
            eyre::bail!("line settle times are unreasonably large (>10ms)");
        }

        // IMU
        if !(0x08..=0x77).contains(&self.imu.address) {
            eyre::bail!("imu.address must be a 7-bit I2C address");
        }
        if !(self.imu.gyro_scale.is_finite() && self.imu.gyro_scale > 0.0) {
            eyre::bail!("imu.gyro_scale must be > 0");
        }
        if self.imu.config_settle_ms > 1_000
            || self.imu.fusion_settle_ms > 1_000
            || self.imu.mode_switch_ms > 1_000
        {
            eyre::bail!("imu settle times are unreasonably large (>1s)");
        }

        // PID
        self.pid.line.validate("line")?;
        self.pid.heading.validate("heading")?;

        // Control
        if self.control.cycle_ms == 0 {
            eyre::bail!("control.cycle_ms must be >= 1");
        }
        if !(self.control.max_effort > 0.0 && self.control.max_effort <= 100.0) {
            eyre::bail!("control.max_effort must be in (0, 100]");
        }
        if !(0.0..=self.control.max_effort).contains(&self.control.base_effort) {
            eyre::bail!("control.base_effort must be in [0, max_effort]");
        }

        // Calibration
        if let Some(cal) = &self.calibration {
            cal.validate()?;
            let n = self.pins.line_channels.len();
            if (!cal.dark.is_empty() && cal.dark.len() != n)
                || (!cal.light.is_empty() && cal.light.len() != n)
            {
                eyre::bail!(
                    "calibration arrays must have one entry per line sensor ({n})"
                );
            }
        }

        Ok(())
    }
}
