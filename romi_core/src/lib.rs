#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Sensing and control core (hardware-agnostic).
//!
//! Every hardware interaction goes through the traits in `romi_traits`, so the
//! same code runs against the simulator, the Raspberry Pi backend, or test
//! doubles.
//!
//! ## Architecture
//!
//! - **Encoders**: 16-bit counter wrap recovery and smoothed velocity (`encoder`)
//! - **Line**: calibrated reflectance array to weighted centroid (`line`)
//! - **Heading**: fusion IMU bring-up, offset and minimal heading error (`heading`)
//! - **Control**: discrete PID law (`pid`)
//! - **Bumpers**: sticky interrupt flags aggregated with OR (`bump`)
//!
//! Operations are synchronous and never spawn threads. The caller owns the
//! cadence.

pub mod bump;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod encoder;
pub mod error;
pub mod heading;
pub mod hw_error;
pub mod line;
pub mod pid;
pub mod ring;
pub mod util;

pub use bump::{BumpArray, BumpFlag};
pub use calibration::{CalibrationStatus, ImuCalibration, LineCalibration};
pub use config::{EncoderCfg, ImuCfg, LineCfg, PidCfg, TimeStep};
pub use encoder::QuadratureFilter;
pub use error::{BuildError, CoreError, HeadingError, Report, Result};
pub use heading::HeadingCorrector;
pub use line::LineCentroidEstimator;
pub use pid::PidController;
