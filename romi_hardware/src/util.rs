/// Safe effort envelope of the motor driver, in percent.
pub const DEFAULT_MAX_EFFORT: f64 = 45.0;

/// Clamp a requested effort into `[-limit, limit]`. Non-finite requests map
/// to 0 so a NaN from upstream can never reach the driver.
#[inline]
pub fn clamp_effort(effort: f64, limit: f64) -> f64 {
    if !effort.is_finite() {
        return 0.0;
    }
    let limit = limit.abs();
    effort.clamp(-limit, limit)
}
