//! Passport score to match coefficient.
//!
//! A coefficient in `[0, 1]` scales how much of a contribution counts toward
//! matching. Scores are mapped through a linear band:
//! - at or below `score.min`: `matchProportionPercentage.min / 100`
//! - at or above `score.max`: `matchProportionPercentage.max / 100`
//! - in between: linear interpolation of the percentage

use crate::types::{PassportScore, ProportionalMatchOptions};

/// Map a score onto the band. A missing score is treated as `score.min`.
///
/// Pure and deterministic: identical float inputs give identical output bits.
pub fn score_to_coefficient(options: &ProportionalMatchOptions, score: Option<f64>) -> f64 {
    let smin = options.score.min;
    let smax = options.score.max;
    let pmin = options.match_proportion_percentage.min;
    let pmax = options.match_proportion_percentage.max;

    let score = score.unwrap_or(smin);
    if score <= smin {
        return pmin / 100.0;
    }
    if score >= smax {
        return pmax / 100.0;
    }

    (pmin + (score - smin) / (smax - smin) * (pmax - pmin)) / 100.0
}

/// Coefficient for a voter under passport-gated matching.
///
/// Voters without a passport record, without evidence, or with a raw score
/// strictly below `score.min` do not pass the gate and get 0. Everyone else
/// is mapped through [`score_to_coefficient`].
pub fn passport_coefficient(
    options: &ProportionalMatchOptions,
    passport: Option<&PassportScore>,
) -> f64 {
    match passport.and_then(PassportScore::raw_score) {
        Some(raw) if raw.is_finite() && raw >= options.score.min => {
            score_to_coefficient(options, Some(raw))
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Band, PassportEvidence};
    use proptest::prelude::*;

    fn band() -> ProportionalMatchOptions {
        ProportionalMatchOptions {
            score: Band { min: 15.0, max: 25.0 },
            match_proportion_percentage: Band { min: 50.0, max: 100.0 },
        }
    }

    fn passport(raw: f64) -> PassportScore {
        PassportScore {
            address: "0xvoter".into(),
            score: None,
            evidence: Some(PassportEvidence {
                raw_score: raw,
                threshold: None,
                success: true,
            }),
        }
    }

    #[test]
    fn below_band_is_min_percentage() {
        assert_eq!(score_to_coefficient(&band(), Some(10.0)), 0.5);
    }

    #[test]
    fn at_band_min() {
        assert_eq!(score_to_coefficient(&band(), Some(15.0)), 0.5);
    }

    #[test]
    fn band_midpoint() {
        assert_eq!(score_to_coefficient(&band(), Some(20.0)), 0.75);
    }

    #[test]
    fn at_band_max() {
        assert_eq!(score_to_coefficient(&band(), Some(25.0)), 1.0);
    }

    #[test]
    fn above_band_is_max_percentage() {
        assert_eq!(score_to_coefficient(&band(), Some(30.0)), 1.0);
    }

    #[test]
    fn missing_score_treated_as_min() {
        assert_eq!(score_to_coefficient(&band(), None), 0.5);
    }

    #[test]
    fn gate_rejects_low_and_missing() {
        let opts = band();
        assert_eq!(passport_coefficient(&opts, None), 0.0);
        assert_eq!(passport_coefficient(&opts, Some(&passport(0.0))), 0.0);
        assert_eq!(passport_coefficient(&opts, Some(&passport(14.99))), 0.0);

        let no_evidence = PassportScore {
            address: "0xvoter".into(),
            score: Some(30.0),
            evidence: None,
        };
        assert_eq!(passport_coefficient(&opts, Some(&no_evidence)), 0.0);
    }

    #[test]
    fn gate_passes_band_scores() {
        let opts = band();
        assert_eq!(passport_coefficient(&opts, Some(&passport(15.0))), 0.5);
        assert_eq!(passport_coefficient(&opts, Some(&passport(20.0))), 0.75);
        assert_eq!(passport_coefficient(&opts, Some(&passport(25.0))), 1.0);
        assert_eq!(passport_coefficient(&opts, Some(&passport(30.0))), 1.0);
    }

    #[test]
    fn gate_rejects_nan_score() {
        assert_eq!(passport_coefficient(&band(), Some(&passport(f64::NAN))), 0.0);
    }

    proptest! {
        #[test]
        fn coefficient_within_unit_interval(score in -100.0f64..100.0) {
            let c = score_to_coefficient(&band(), Some(score));
            prop_assert!((0.0..=1.0).contains(&c));
        }

        #[test]
        fn coefficient_monotonic(a in -10.0f64..40.0, b in -10.0f64..40.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let opts = band();
            prop_assert!(
                score_to_coefficient(&opts, Some(lo)) <= score_to_coefficient(&opts, Some(hi)),
                "not monotonic between {} and {}", lo, hi
            );
        }

        #[test]
        fn coefficient_deterministic(score in -10.0f64..40.0) {
            let opts = band();
            let a = score_to_coefficient(&opts, Some(score));
            let b = score_to_coefficient(&opts, Some(score));
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
