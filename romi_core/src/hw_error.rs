//! Maps `Box<dyn Error>` from trait boundaries to typed `CoreError`.
//!
//! The traits in `romi_traits` use `Box<dyn Error + Send + Sync>` so that
//! simulated and real hardware can report whatever they like; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `romi_hardware::HwError` downcasting.

use eyre::WrapErr;
use romi_traits::HwResult;

use crate::error::{CoreError, Result};

/// Map a trait-boundary error to a typed `CoreError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<romi_hardware::error::HwError>() {
            return match hw {
                romi_hardware::error::HwError::Timeout => CoreError::Timeout,
                other => CoreError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::Timeout
    } else {
        CoreError::Hardware(s)
    }
}

/// Lift a trait-boundary result into a core result, tagging it with `what`.
pub fn lift<T>(r: HwResult<T>, what: &'static str) -> Result<T> {
    r.map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err(what)
}
