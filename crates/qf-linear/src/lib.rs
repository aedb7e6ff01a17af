//! # qf-linear: Linear quadratic-funding allocation.
//!
//! Default [`AllocationAlgorithm`] backend for the `qf-calc` binary. The
//! calculator itself only sees the trait.
//!
//! Per application:
//! - contributors whose summed amount is below `min_contribution` are left out;
//! - `sum_of_sqrt = Σ isqrt(amount)` over the remaining contributors;
//! - raw match is `sum_of_sqrt² - Σ amount` (zero for a lone contributor).
//!
//! Raw matches are scaled to the pool (`raw * pool / Σ raw`) unless
//! `ignore_saturation` is set and the raw total already fits the pool. A
//! `matching_cap_amount` then clamps each application, recording the excess
//! in `cap_overflow`. All arithmetic is integer; divisions truncate.

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::debug;

use qf_core::aggregate::AggregatedContributions;
use qf_core::error::AllocationError;
use qf_core::traits::AllocationAlgorithm;
use qf_core::types::{Allocation, AllocationOptions, ProjectMatch};

/// Linear QF over integer round-token amounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearQf;

impl LinearQf {
    pub fn new() -> Self {
        Self
    }
}

struct RawMatch {
    application_id: String,
    total_received: BigUint,
    contributions_count: usize,
    raw: BigUint,
}

fn raw_match(
    application_id: &str,
    contributions: &qf_core::aggregate::ProjectContributions,
    min_contribution: &BigUint,
) -> RawMatch {
    let mut sum_of_sqrt = BigUint::zero();
    let mut counted = BigUint::zero();
    for amount in contributions.contributions.values() {
        if &amount.0 < min_contribution {
            continue;
        }
        sum_of_sqrt += amount.0.sqrt();
        counted += &amount.0;
    }

    let squared = &sum_of_sqrt * &sum_of_sqrt;
    // isqrt floors, so the square can dip below the plain sum.
    let raw = if squared > counted {
        squared - counted
    } else {
        BigUint::zero()
    };

    RawMatch {
        application_id: application_id.to_string(),
        total_received: contributions.total_received.clone(),
        contributions_count: contributions.contributions.len(),
        raw,
    }
}

impl AllocationAlgorithm for LinearQf {
    fn compute(
        &self,
        contributions: &AggregatedContributions,
        match_pool: &BigUint,
        options: &AllocationOptions,
    ) -> Result<Allocation, AllocationError> {
        let raws: Vec<RawMatch> = contributions
            .iter()
            .map(|(id, p)| raw_match(id, p, &options.min_contribution))
            .collect();

        let total_raw = raws
            .iter()
            .fold(BigUint::zero(), |acc, r| acc + &r.raw);
        let saturated = &total_raw > match_pool;
        let scale = !total_raw.is_zero() && (saturated || !options.ignore_saturation);

        debug!(
            projects = raws.len(),
            total_raw = %total_raw,
            match_pool = %match_pool,
            saturated,
            "linear_qf: raw matches computed"
        );

        let mut allocation = Allocation::new();
        for r in raws {
            let matched_without_cap = if scale {
                &r.raw * match_pool / &total_raw
            } else {
                r.raw.clone()
            };

            let (matched, cap_overflow) = match &options.matching_cap_amount {
                Some(cap) if &matched_without_cap > cap => {
                    (cap.clone(), &matched_without_cap - cap)
                }
                _ => (matched_without_cap.clone(), BigUint::zero()),
            };

            allocation.insert(
                r.application_id,
                ProjectMatch {
                    total_received: r.total_received,
                    contributions_count: r.contributions_count,
                    matched_without_cap,
                    cap_overflow,
                    matched,
                },
            );
        }

        Ok(allocation)
    }
}
