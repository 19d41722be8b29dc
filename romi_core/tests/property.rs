use proptest::prelude::*;
use romi_core::encoder::wrap_delta;
use romi_core::heading::{corrected_heading, heading_error};
use romi_core::line::{centroid_of, normalize_reading};

proptest! {
    #[test]
    fn wrap_recovers_any_change_below_half_range(prev in any::<u16>(), delta in -32_767i32..=32_767) {
        let current = (i32::from(prev) + delta).rem_euclid(65_536) as u16;
        prop_assert_eq!(wrap_delta(prev, current), delta);
    }

    #[test]
    fn normalized_reading_stays_in_unit_interval(raw in any::<u16>(), dark in any::<u16>(), light in any::<u16>()) {
        let v = normalize_reading(raw, dark, light, 5);
        prop_assert!((0.0..=1.0).contains(&v));
        if dark == light {
            prop_assert_eq!(v, 0.5);
        }
    }

    #[test]
    fn corrected_heading_in_half_open_turn(raw in 0.0f64..360.0, offset in 0.0f64..360.0) {
        let h = corrected_heading(raw, offset);
        prop_assert!((0.0..360.0).contains(&h), "h = {}", h);
    }

    #[test]
    fn heading_error_is_minimal_rotation(heading in 0.0f64..360.0, target in 0.0f64..360.0) {
        let e = heading_error(heading, target);
        prop_assert!((-180.0..=180.0).contains(&e), "e = {}", e);
        let back = (target + e).rem_euclid(360.0);
        let diff = (back - heading).abs();
        prop_assert!(diff < 1e-9 || (360.0 - diff) < 1e-9);
    }

    #[test]
    fn centroid_lies_on_the_array_or_is_sentinel(values in prop::collection::vec(0.0f64..=1.0, 1..12)) {
        let n = values.len() as f64;
        let c = centroid_of(&values, n + 1.0);
        prop_assert!((1.0 - 1e-9..=n + 1e-9).contains(&c) || c == n + 1.0, "c = {}", c);
    }
}
