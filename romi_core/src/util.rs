//! Common time and angle helpers for romi_core.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Degrees in a full turn.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Convert a microsecond count to seconds.
#[inline]
pub fn us_to_secs(us: u64) -> f64 {
    us as f64 / MICROS_PER_SEC as f64
}

/// Round `x` to `digits` decimal places, ties to even.
#[inline]
pub fn round_to_digits(x: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits.min(15) as i32);
    (x * scale).round_ties_even() / scale
}

/// Reduce an angle in degrees to [0, 360).
///
/// `rem_euclid` can land exactly on 360.0 for tiny negative inputs; that case
/// folds back to 0.
#[inline]
pub fn wrap_degrees(deg: f64) -> f64 {
    let r = deg.rem_euclid(FULL_TURN_DEG);
    if r >= FULL_TURN_DEG { 0.0 } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_micros() {
        assert_eq!(us_to_secs(MICROS_PER_SEC), 1.0);
        assert_eq!(us_to_secs(15_000), 0.015);
    }

    #[test]
    fn rounds_to_five_digits() {
        assert_eq!(round_to_digits(0.123456, 5), 0.12346);
        assert_eq!(round_to_digits(1.0 / 3.0, 5), 0.33333);
        assert_eq!(round_to_digits(-0.000004, 5), -0.0);
    }

    #[test]
    fn exact_ties_go_to_even() {
        // 1/64 and 3/64 are exact in binary, so the sixth digit is a true tie.
        assert_eq!(round_to_digits(0.015625, 5), 0.01562);
        assert_eq!(round_to_digits(0.046875, 5), 0.04688);
        assert_eq!(round_to_digits(0.5, 0), 0.0);
        assert_eq!(round_to_digits(1.5, 0), 2.0);
    }

    #[test]
    fn wraps_into_half_open_turn() {
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-20.0), 340.0);
        assert_eq!(wrap_degrees(725.5), 5.5);
        let tiny = wrap_degrees(-1e-18);
        assert!((0.0..360.0).contains(&tiny));
    }
}
