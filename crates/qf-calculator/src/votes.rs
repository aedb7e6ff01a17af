//! Vote pipeline: application filter, coefficients, overrides, vote cap,
//! aggregation.

use std::collections::BTreeMap;

use tracing::debug;

use qf_core::aggregate::{apply_coefficient, to_contribution, AggregatedContributions};
use qf_core::coefficient::passport_coefficient;
use qf_core::error::CoefficientError;
use qf_core::overrides::CoefficientOverrides;
use qf_core::traits::ReputationProvider;
use qf_core::types::{
    Application, ChainConfig, Contribution, ProportionalMatchOptions, Vote, VoteWithCoefficient,
};
use qf_core::vote_cap::apply_vote_cap;

use crate::error::CalculatorError;

/// Inputs shared by every vote of one request.
pub struct VoteContext<'a> {
    pub chain: &'a ChainConfig,
    pub proportional_match: &'a ProportionalMatchOptions,
    /// Source of passport scores; `None` disables passport weighting.
    pub passport: Option<&'a dyn ReputationProvider>,
    pub overrides: Option<&'a CoefficientOverrides>,
}

impl VoteContext<'_> {
    /// Coefficient for one vote: passport-derived (or 1 without passport),
    /// replaced outright by an override for the vote id.
    pub fn coefficient(&self, vote: &Vote) -> Result<f64, CalculatorError> {
        if let Some(c) = self.overrides.and_then(|o| o.get(&vote.id)) {
            return Ok(c);
        }
        let Some(reputation) = self.passport else {
            return Ok(1.0);
        };
        let looked_up;
        let passport = match &vote.passport {
            Some(attached) => Some(attached),
            None => {
                looked_up = reputation.score(&vote.voter)?;
                looked_up.as_ref()
            }
        };
        Ok(passport_coefficient(self.proportional_match, passport))
    }
}

/// Index applications by id.
pub fn index_applications(
    applications: Vec<Application>,
) -> BTreeMap<String, Application> {
    applications.into_iter().map(|a| (a.id.clone(), a)).collect()
}

/// Resolve coefficients and apply the vote cap to every vote that targets an
/// approved application. Votes for other applications are dropped.
pub fn votes_with_coefficients(
    ctx: &VoteContext<'_>,
    votes: Vec<Vote>,
    applications: &BTreeMap<String, Application>,
) -> Result<Vec<VoteWithCoefficient>, CalculatorError> {
    let total = votes.len();
    let mut out = Vec::with_capacity(total);

    for vote in votes {
        let approved = applications
            .get(&vote.application_id)
            .is_some_and(Application::is_approved);
        if !approved {
            continue;
        }

        let coefficient = ctx.coefficient(&vote)?;
        if !coefficient.is_finite() {
            return Err(CoefficientError::NonFinite { vote_id: vote.id }.into());
        }

        let vote = apply_vote_cap(ctx.chain, &vote)?;
        out.push(VoteWithCoefficient { vote, coefficient });
    }

    debug!(
        total,
        kept = out.len(),
        dropped = total - out.len(),
        "votes: coefficients resolved"
    );
    Ok(out)
}

/// Sum coefficient-weighted round-token amounts per application and voter.
pub fn aggregate(votes: &[VoteWithCoefficient]) -> AggregatedContributions {
    votes.iter().map(to_contribution).collect()
}

/// A contribution worth `amount` round-token units scaled by `coefficient`.
pub fn weighted_contribution(
    voter: &str,
    application_id: &str,
    amount: &num_bigint::BigUint,
    coefficient: f64,
) -> Contribution {
    Contribution {
        voter: voter.to_lowercase(),
        application_id: application_id.to_string(),
        amount: apply_coefficient(amount, coefficient),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use qf_core::error::{DataError, VoteCapError};
    use qf_core::types::{ApplicationStatus, PassportEvidence, PassportScore, TokenConfig};
    use qf_data::PassportStore;

    fn chain(cap: Option<u64>) -> ChainConfig {
        ChainConfig {
            id: 10,
            name: "optimism".into(),
            tokens: vec![TokenConfig {
                address: "0xDAI".into(),
                code: "DAI".into(),
                decimals: 18,
                vote_amount_cap: cap.map(BigUint::from),
            }],
        }
    }

    fn vote(id: &str, voter: &str, app: &str, amount: u64) -> Vote {
        Vote {
            id: id.into(),
            voter: voter.into(),
            application_id: app.into(),
            project_id: format!("p-{app}"),
            token: "0xdai".into(),
            amount: BigUint::from(amount),
            amount_usd: amount as f64,
            amount_round_token: BigUint::from(amount),
            passport: None,
        }
    }

    fn app(id: &str, status: ApplicationStatus) -> Application {
        Application {
            id: id.into(),
            project_id: format!("p-{id}"),
            status,
            project_name: id.to_uppercase(),
            payout_address: "0xpay".into(),
        }
    }

    fn apps() -> BTreeMap<String, Application> {
        index_applications(vec![
            app("a", ApplicationStatus::Approved),
            app("b", ApplicationStatus::Rejected),
        ])
    }

    fn passport(address: &str, raw: f64) -> PassportScore {
        PassportScore {
            address: address.into(),
            score: None,
            evidence: Some(PassportEvidence {
                raw_score: raw,
                threshold: None,
                success: true,
            }),
        }
    }

    fn ctx<'a>(
        chain: &'a ChainConfig,
        opts: &'a ProportionalMatchOptions,
        passport: Option<&'a dyn ReputationProvider>,
        overrides: Option<&'a CoefficientOverrides>,
    ) -> VoteContext<'a> {
        VoteContext {
            chain,
            proportional_match: opts,
            passport,
            overrides,
        }
    }

    #[test]
    fn unapproved_and_unknown_applications_dropped() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let votes = vec![
            vote("1", "0x1", "a", 10),
            vote("2", "0x2", "b", 10),
            vote("3", "0x3", "zzz", 10),
        ];
        let out = votes_with_coefficients(&ctx(&chain, &opts, None, None), votes, &apps()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].vote.id, "1");
        assert_eq!(out[0].coefficient, 1.0);
    }

    #[test]
    fn passport_from_provider_then_attached() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let store = PassportStore::from_scores(vec![passport("0x1", 20.0)]);

        let mut attached = vote("2", "0x2", "a", 10);
        attached.passport = Some(passport("0x2", 30.0));
        let votes = vec![vote("1", "0X1", "a", 10), attached, vote("3", "0x3", "a", 10)];

        let out =
            votes_with_coefficients(&ctx(&chain, &opts, Some(&store), None), votes, &apps())
                .unwrap();
        let coefficients: Vec<f64> = out.iter().map(|v| v.coefficient).collect();
        assert_eq!(coefficients, vec![0.75, 1.0, 0.0]);
    }

    #[test]
    fn override_replaces_computed_coefficient() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let store = PassportStore::from_scores(vec![passport("0x1", 25.0)]);
        let overrides: CoefficientOverrides = [("1".to_string(), 0.2)].into_iter().collect();

        let votes = vec![vote("1", "0x1", "a", 10), vote("2", "0x1", "a", 10)];
        let out = votes_with_coefficients(
            &ctx(&chain, &opts, Some(&store), Some(&overrides)),
            votes,
            &apps(),
        )
        .unwrap();
        assert_eq!(out[0].coefficient, 0.2);
        assert_eq!(out[1].coefficient, 1.0);
    }

    #[test]
    fn override_applies_without_passport() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let overrides: CoefficientOverrides = [("1".to_string(), 0.0)].into_iter().collect();
        let out = votes_with_coefficients(
            &ctx(&chain, &opts, None, Some(&overrides)),
            vec![vote("1", "0x1", "a", 10)],
            &apps(),
        )
        .unwrap();
        assert_eq!(out[0].coefficient, 0.0);
    }

    #[test]
    fn non_finite_override_rejected() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let overrides: CoefficientOverrides =
            [("1".to_string(), f64::INFINITY)].into_iter().collect();
        let err = votes_with_coefficients(
            &ctx(&chain, &opts, None, Some(&overrides)),
            vec![vote("1", "0x1", "a", 10)],
            &apps(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CalculatorError::Coefficient(CoefficientError::NonFinite { vote_id: "1".into() })
        );
    }

    #[test]
    fn vote_cap_rescales_round_token_amount() {
        let chain = chain(Some(500));
        let opts = ProportionalMatchOptions::default();
        let mut v = vote("1", "0x1", "a", 1000);
        v.amount_round_token = BigUint::from(200u32);
        let out =
            votes_with_coefficients(&ctx(&chain, &opts, None, None), vec![v], &apps()).unwrap();
        assert_eq!(out[0].vote.amount_round_token, BigUint::from(100u32));
        assert_eq!(out[0].vote.amount, BigUint::from(1000u32));
    }

    #[test]
    fn unknown_token_aborts() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let mut v = vote("1", "0x1", "a", 10);
        v.token = "0xother".into();
        let err = votes_with_coefficients(&ctx(&chain, &opts, None, None), vec![v], &apps())
            .unwrap_err();
        assert_eq!(
            err,
            CalculatorError::VoteCap(VoteCapError::UnknownToken("0xother".into()))
        );
    }

    struct Broken;

    impl ReputationProvider for Broken {
        fn score(&self, _: &str) -> Result<Option<PassportScore>, DataError> {
            Err(DataError::Io {
                path: "passport_scores.json".into(),
                message: "gone".into(),
            })
        }
    }

    #[test]
    fn reputation_failure_aborts() {
        let chain = chain(None);
        let opts = ProportionalMatchOptions::default();
        let err = votes_with_coefficients(
            &ctx(&chain, &opts, Some(&Broken), None),
            vec![vote("1", "0x1", "a", 10)],
            &apps(),
        )
        .unwrap_err();
        assert_eq!(err.stage(), "load");
    }

    #[test]
    fn aggregate_sums_per_voter_with_coefficient() {
        let weighted = vec![
            VoteWithCoefficient {
                vote: vote("1", "0xA", "a", 1000),
                coefficient: 0.5,
            },
            VoteWithCoefficient {
                vote: vote("2", "0xa", "a", 1000),
                coefficient: 0.75,
            },
        ];
        let agg = aggregate(&weighted);
        let project = agg.get("a").unwrap();
        assert_eq!(project.total_received, BigUint::from(1250u32));
        assert_eq!(project.contributions.len(), 1);
    }

    #[test]
    fn weighted_contribution_truncates() {
        let c = weighted_contribution("0xAB", "a", &BigUint::from(999u32), 0.5);
        assert_eq!(c.voter, "0xab");
        assert_eq!(c.amount, BigUint::from(499u32));
    }
}
