use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
}

/// Orientation sensor failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeadingError {
    /// Fatal at initialization: the device on the bus is not the expected chip.
    #[error("orientation sensor not found (chip id 0x{found:02X}, expected 0x{expected:02X})")]
    ChipIdMismatch { expected: u8, found: u8 },
    /// Rejected before any register write.
    #[error("calibration data must be {expected} bytes long, got {actual}")]
    CalibrationLength { expected: usize, actual: usize },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("line sensor array needs at least one channel")]
    NoSensors,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
