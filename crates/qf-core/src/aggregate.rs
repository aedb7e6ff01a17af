//! Per-application aggregation of weighted contributions.
//!
//! Coefficients are applied to round-token amounts with four decimals of
//! fixed-point precision ([`COEFFICIENT_PRECISION`]). The scaled coefficient
//! is truncated to a whole step after snapping away float representation
//! error, so `0.57` applies as `5700 / 10_000`, not `5699 / 10_000`.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::constants::COEFFICIENT_PRECISION;
use crate::types::{Contribution, VoteWithCoefficient};

/// All contributions received by one application, summed per voter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContributions {
    #[serde(with = "crate::amount")]
    pub total_received: BigUint,
    pub contributions: BTreeMap<String, ContributorAmount>,
}

/// A single voter's summed contribution to one application.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ContributorAmount(#[serde(with = "crate::amount")] pub BigUint);

/// Round-wide aggregation keyed by application id; the allocation input and
/// the payload of the round contribution cache.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct AggregatedContributions {
    projects: BTreeMap<String, ProjectContributions>,
}

impl AggregatedContributions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one contribution, merging with the voter's existing amount.
    pub fn add(&mut self, contribution: Contribution) {
        let project = self
            .projects
            .entry(contribution.application_id)
            .or_default();
        project.total_received += &contribution.amount;
        project
            .contributions
            .entry(contribution.voter)
            .or_default()
            .0 += contribution.amount;
    }

    pub fn get(&self, application_id: &str) -> Option<&ProjectContributions> {
        self.projects.get(application_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProjectContributions)> {
        self.projects.iter()
    }

    /// Number of applications with at least one contribution.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Sum of `total_received` over all applications.
    pub fn total(&self) -> BigUint {
        self.projects
            .values()
            .fold(BigUint::zero(), |acc, p| acc + &p.total_received)
    }
}

impl FromIterator<Contribution> for AggregatedContributions {
    fn from_iter<I: IntoIterator<Item = Contribution>>(iter: I) -> Self {
        let mut agg = Self::new();
        for c in iter {
            agg.add(c);
        }
        agg
    }
}

/// Sub-steps per coefficient step used to absorb representation error.
const COEFFICIENT_SUBSTEPS: u64 = 100;

/// `amount * steps / 10_000`, where `steps` is the coefficient in whole
/// 1e-4 steps.
///
/// The coefficient is first rounded to the nearest 1e-6 and only then
/// truncated to 1e-4. Rounding removes the float error in values like
/// `0.57 * 10_000 = 5699.999…`. Digits past the fourth decimal are still
/// dropped, never rounded up.
///
/// Coefficients are clamped into `[0, 1]` first; callers reject non-finite
/// coefficients before getting here.
pub fn apply_coefficient(amount: &BigUint, coefficient: f64) -> BigUint {
    let substeps = (coefficient.clamp(0.0, 1.0)
        * (COEFFICIENT_PRECISION * COEFFICIENT_SUBSTEPS) as f64)
        .round()
        .to_u64()
        .unwrap_or(0);
    amount * (substeps / COEFFICIENT_SUBSTEPS) / COEFFICIENT_PRECISION
}

/// Turn a coefficient-weighted vote into a round-token contribution.
pub fn to_contribution(v: &VoteWithCoefficient) -> Contribution {
    Contribution {
        voter: v.vote.voter.to_lowercase(),
        application_id: v.vote.application_id.clone(),
        amount: apply_coefficient(&v.vote.amount_round_token, v.coefficient),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficient::score_to_coefficient;
    use crate::types::ProportionalMatchOptions;

    fn contribution(voter: &str, app: &str, amount: u64) -> Contribution {
        Contribution {
            voter: voter.into(),
            application_id: app.into(),
            amount: BigUint::from(amount),
        }
    }

    #[test]
    fn sums_per_voter_and_project() {
        let agg: AggregatedContributions = vec![
            contribution("0xa", "1", 100),
            contribution("0xa", "1", 50),
            contribution("0xb", "1", 25),
            contribution("0xa", "2", 10),
        ]
        .into_iter()
        .collect();

        assert_eq!(agg.len(), 2);
        let p1 = agg.get("1").unwrap();
        assert_eq!(p1.total_received, BigUint::from(175u32));
        assert_eq!(p1.contributions.len(), 2);
        assert_eq!(p1.contributions["0xa"].0, BigUint::from(150u32));
        assert_eq!(agg.total(), BigUint::from(185u32));
    }

    #[test]
    fn coefficient_fixed_point() {
        let amount = BigUint::from(1000u32);
        assert_eq!(apply_coefficient(&amount, 0.0), BigUint::zero());
        assert_eq!(apply_coefficient(&amount, 0.5), BigUint::from(500u32));
        assert_eq!(apply_coefficient(&amount, 0.75), BigUint::from(750u32));
        assert_eq!(apply_coefficient(&amount, 1.0), BigUint::from(1000u32));
    }

    #[test]
    fn coefficient_truncated_at_four_decimals() {
        // 0.12349 -> 1234 / 10_000
        let amount = BigUint::from(10_000u32);
        assert_eq!(apply_coefficient(&amount, 0.12349), BigUint::from(1234u32));
    }

    #[test]
    fn coefficient_not_biased_by_float_representation() {
        let amount = BigUint::from(10_000u32);
        // 0.57 * 10_000 is 5699.999... in f64.
        assert_eq!(apply_coefficient(&amount, 0.57), BigUint::from(5700u32));
        assert_eq!(apply_coefficient(&amount, 0.29), BigUint::from(2900u32));

        // Score 16.4 on the default band interpolates to 0.57.
        let c = score_to_coefficient(&ProportionalMatchOptions::default(), Some(16.4));
        assert_eq!(apply_coefficient(&amount, c), BigUint::from(5700u32));
    }

    #[test]
    fn coefficient_clamped() {
        let amount = BigUint::from(1000u32);
        assert_eq!(apply_coefficient(&amount, 1.7), BigUint::from(1000u32));
        assert_eq!(apply_coefficient(&amount, -0.3), BigUint::zero());
    }

    #[test]
    fn serde_keeps_amounts_as_strings() {
        let agg: AggregatedContributions =
            std::iter::once(contribution("0xa", "1", 7)).collect();
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["projects"]["1"]["totalReceived"], "7");
        assert_eq!(json["projects"]["1"]["contributions"]["0xa"], "7");
    }
}
