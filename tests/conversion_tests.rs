use thermologger::conversion::{
    mv_to_celsius, uv_to_celsius, Branch, K_TYPE_MAX_UV, K_TYPE_MID_MAX_UV, K_TYPE_MIN_UV,
};
use thermologger::ThermoError;

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} ± {}, got {}",
        expected,
        tolerance,
        actual
    );
}

#[cfg(test)]
mod reference_point_tests {
    use super::*;

    #[test]
    fn test_nist_table_points() {
        // EMF values from the NIST K-type reference table
        assert_close(uv_to_celsius(-5891.0).unwrap(), -200.0, 0.1);
        assert_close(uv_to_celsius(-3554.0).unwrap(), -100.0, 0.1);
        assert_close(uv_to_celsius(4096.0).unwrap(), 100.0, 0.1);
        assert_close(uv_to_celsius(20644.0).unwrap(), 500.0, 0.1);
        assert_close(uv_to_celsius(41276.0).unwrap(), 1000.0, 0.1);
        assert_close(uv_to_celsius(54886.0).unwrap(), 1372.0, 0.1);
    }

    #[test]
    fn test_negative_emf_is_below_zero() {
        for uv in [-5891.0, -5000.0, -2000.0, -500.0, -1.0] {
            let celsius = uv_to_celsius(uv).unwrap();
            assert!((-200.1..0.0).contains(&celsius), "{} uV gave {} °C", uv, celsius);
        }
    }

    #[test]
    fn test_zero_is_zero() {
        assert_eq!(uv_to_celsius(0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_millivolt_entry_matches_microvolts() {
        for mv in [-5.891, -1.0, 0.0, 4.096, 20.644, 33.3, 54.886] {
            let via_mv = mv_to_celsius(mv).unwrap();
            let via_uv = uv_to_celsius(mv * 1000.0).unwrap();
            assert_eq!(via_mv, via_uv);
        }
    }

    #[test]
    fn test_monotonic_across_range() {
        let mut previous = uv_to_celsius(K_TYPE_MIN_UV).unwrap();
        let mut uv = K_TYPE_MIN_UV + 50.0;
        while uv <= K_TYPE_MAX_UV {
            let current = uv_to_celsius(uv).unwrap();
            assert!(current > previous, "not increasing at {} uV", uv);
            previous = current;
            uv += 50.0;
        }
    }
}

#[cfg(test)]
mod branch_boundary_tests {
    use super::*;

    #[test]
    fn test_branch_selection() {
        assert_eq!(Branch::for_microvolts(-0.001), Branch::Negative);
        assert_eq!(Branch::for_microvolts(0.0), Branch::Mid);
        assert_eq!(Branch::for_microvolts(K_TYPE_MID_MAX_UV), Branch::Mid);
        assert_eq!(Branch::for_microvolts(20645.0), Branch::High);
        assert_eq!(Branch::for_microvolts(K_TYPE_MIN_UV), Branch::Negative);
        assert_eq!(Branch::for_microvolts(K_TYPE_MAX_UV), Branch::High);
    }

    #[test]
    fn test_mid_to_high_transition_is_smooth() {
        let mid = uv_to_celsius(20644.0).unwrap();
        let high = uv_to_celsius(20645.0).unwrap();
        // The two fits meet near 500 °C but are not continuous there
        assert!((high - mid).abs() < 0.1);
    }

    #[test]
    fn test_negative_to_mid_transition_is_smooth() {
        let below = uv_to_celsius(-1.0).unwrap();
        let above = uv_to_celsius(1.0).unwrap();
        assert!(below < 0.0 && above > 0.0);
        assert!(above - below < 0.1);
    }

    #[test]
    fn test_range_limits_are_inclusive() {
        assert!(uv_to_celsius(K_TYPE_MIN_UV).is_ok());
        assert!(uv_to_celsius(K_TYPE_MAX_UV).is_ok());
    }
}

#[cfg(test)]
mod out_of_range_tests {
    use super::*;

    #[test]
    fn test_outside_range_rejected() {
        for uv in [-5891.1, -10000.0, 54886.1, 60000.0, f64::INFINITY, f64::NEG_INFINITY] {
            match uv_to_celsius(uv) {
                Err(ThermoError::OutOfRange { microvolts }) => assert_eq!(microvolts, uv),
                other => panic!("expected OutOfRange for {}, got {:?}", uv, other),
            }
        }
    }

    #[test]
    fn test_nan_rejected() {
        assert!(matches!(mv_to_celsius(f64::NAN), Err(ThermoError::OutOfRange { .. })));
    }

    #[test]
    fn test_out_of_range_is_channel_local() {
        let err = mv_to_celsius(60.0).unwrap_err();
        assert!(err.is_channel_local());
    }
}
