//! Human-readable error descriptions and structured JSON error formatting.

use romi_core::error::{BuildError, CoreError, HeadingError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(he) = err.downcast_ref::<HeadingError>() {
        return match he {
            HeadingError::ChipIdMismatch { expected, found } => format!(
                "What happened: The orientation sensor did not identify itself (chip id 0x{found:02X}, expected 0x{expected:02X}).\nLikely causes: Wrong I2C address or bus, loose wiring, or the sensor is still booting.\nHow to fix: Check [imu].address and [imu].i2c_bus in the config and the sensor's power and SDA/SCL lines."
            ),
            HeadingError::CalibrationLength { expected, actual } => format!(
                "What happened: Stored IMU calibration has {actual} bytes; the sensor takes exactly {expected}.\nLikely causes: The calibration file was edited by hand or written by another tool.\nHow to fix: Re-run `romi calibrate --out <file>` to capture a fresh block."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::NoSensors => {
                "What happened: The line sensor array has no channels.\nLikely causes: [pins].line_channels is empty.\nHow to fix: List one ADC channel per sensor in physical order, left to right.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Calibration arrays do not match the number of line sensors.\nHow to fix: Re-run calibration or fix the [calibration] table, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::Timeout => "What happened: A sensor read timed out.\nLikely causes: Bus contention, wiring faults, or a device that stopped responding.\nHow to fix: Check wiring and power, then rerun with --log-level=debug.".to_string(),
            CoreError::HardwareFault(msg) | CoreError::Hardware(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Device unplugged, wrong bus or pin numbers, or insufficient permissions.\nHow to fix: Verify [pins] and [imu] in the config and that the process may access GPIO/I2C/SPI."
            ),
            CoreError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the config file and try again."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open gpio") || lower.contains("open motor pins") || lower.contains("open imu bus")
    {
        return "What happened: Failed to initialize hardware.\nLikely causes: Incorrect pin numbers or bus, or insufficient GPIO/I2C/SPI permissions.\nHow to fix: Fix [pins] and [imu] in the config; ensure the process has access to the devices.".to_string();
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'sensor,dark,light'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: chip mismatch 3, bad IMU calibration length 4, others 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<HeadingError>() {
        Some(HeadingError::ChipIdMismatch { .. }) => 3,
        Some(HeadingError::CalibrationLength { .. }) => 4,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(he) = err.downcast_ref::<HeadingError>() {
        return match he {
            HeadingError::ChipIdMismatch { .. } => "ChipIdMismatch",
            HeadingError::CalibrationLength { .. } => "CalibrationLength",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Timeout) => "Timeout",
        Some(CoreError::Hardware(_) | CoreError::HardwareFault(_)) => "Hardware",
        Some(CoreError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(HeadingError::ChipIdMismatch { expected, found }) =
        err.downcast_ref::<HeadingError>()
    {
        return json!({
            "reason": reason_name(err),
            "details": { "expected": expected, "found": found },
            "message": humanize(err),
        })
        .to_string();
    }
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_mismatch_has_its_own_code() {
        let err = eyre::Report::new(HeadingError::ChipIdMismatch {
            expected: 0xA0,
            found: 0x42,
        });
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("0x42"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "ChipIdMismatch");
        assert_eq!(v["details"]["found"], 0x42);
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        use eyre::WrapErr;
        let r: eyre::Result<()> = Err(eyre::Report::new(HeadingError::CalibrationLength {
            expected: 22,
            actual: 21,
        }));
        let err = r.wrap_err("restore imu").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn timeout_reason() {
        let err = eyre::Report::new(CoreError::Timeout);
        assert_eq!(exit_code_for_error(&err), 1);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Timeout");
    }

    #[test]
    fn csv_header_hint() {
        let err = eyre::eyre!("calibration CSV must have headers sensor,dark,light");
        assert!(humanize(&err).contains("Invalid headers"));
    }
}
