//! Hardware backends for the robot.
//!
//! The simulator is always available. Raspberry Pi devices (I2C orientation
//! sensor, SPI ADC, GPIO counters/bumpers/motors) build with the `hardware`
//! feature.
pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod bno055;
#[cfg(feature = "hardware")]
pub mod gpio;
#[cfg(feature = "hardware")]
pub mod mcp3008;

pub use sim::{Side, SimFault, SimParams, SimPose, SimRobot, Surface};
