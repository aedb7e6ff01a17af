//! Round data types: votes, applications, passports, chain/token config,
//! allocation inputs and outputs.
//!
//! Token amounts are arbitrary precision ([`BigUint`]) and serialize as
//! decimal strings; USD values are `f64` as produced upstream.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MATCH_PCT_MAX, DEFAULT_MATCH_PCT_MIN, DEFAULT_SCORE_MAX, DEFAULT_SCORE_MIN,
};
use crate::error::CoefficientError;

/// EVM chain id.
pub type ChainId = u64;

/// One normalized contribution record, as produced by the indexer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub voter: String,
    pub application_id: String,
    #[serde(default)]
    pub project_id: String,
    /// Address of the token the vote was paid in.
    pub token: String,
    /// Raw amount in the vote token's smallest unit.
    #[serde(with = "crate::amount")]
    pub amount: BigUint,
    /// USD value at the time of the vote.
    #[serde(rename = "amountUSD", default)]
    pub amount_usd: f64,
    /// Amount denominated in the round's matching token.
    #[serde(with = "crate::amount")]
    pub amount_round_token: BigUint,
    /// Reputation evidence attached upstream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport: Option<PassportScore>,
}

/// Raw sub-score evidence carried by a passport record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassportEvidence {
    #[serde(deserialize_with = "crate::amount::lenient_f64")]
    pub raw_score: f64,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub success: bool,
}

/// A voter's reputation record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassportScore {
    pub address: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub evidence: Option<PassportEvidence>,
}

impl PassportScore {
    /// The raw score used for coefficient banding.
    pub fn raw_score(&self) -> Option<f64> {
        self.evidence.as_ref().map(|e| e.raw_score)
    }
}

/// Review state of a round application.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    InReview,
    #[serde(other)]
    Unknown,
}

/// A project's application to a round, with the display fields echoed in results.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub payout_address: String,
}

impl Application {
    pub fn is_approved(&self) -> bool {
        self.status == ApplicationStatus::Approved
    }
}

/// A closed `[min, max]` interval.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

/// Linear band mapping a passport score onto a match percentage.
///
/// Field names are snake_case so the struct loads cleanly from config files;
/// the camelCase spelling used by round metadata is accepted as an alias.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ProportionalMatchOptions {
    pub score: Band,
    #[serde(alias = "matchProportionPercentage")]
    pub match_proportion_percentage: Band,
}

impl Default for ProportionalMatchOptions {
    fn default() -> Self {
        Self {
            score: Band {
                min: DEFAULT_SCORE_MIN,
                max: DEFAULT_SCORE_MAX,
            },
            match_proportion_percentage: Band {
                min: DEFAULT_MATCH_PCT_MIN,
                max: DEFAULT_MATCH_PCT_MAX,
            },
        }
    }
}

impl ProportionalMatchOptions {
    /// Check `score.min < score.max` and both percentages within `[0, 100]`.
    pub fn validate(&self) -> Result<(), CoefficientError> {
        let Band { min, max } = self.score;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(CoefficientError::InvalidScoreBand { min, max });
        }
        for pct in [
            self.match_proportion_percentage.min,
            self.match_proportion_percentage.max,
        ] {
            if !(0.0..=100.0).contains(&pct) {
                return Err(CoefficientError::PercentageOutOfRange(pct));
            }
        }
        Ok(())
    }
}

/// Per-token configuration on a chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TokenConfig {
    pub address: String,
    #[serde(default)]
    pub code: String,
    pub decimals: u32,
    /// Ceiling used to rescale `amountRoundToken`; `None` means uncapped.
    #[serde(with = "crate::amount::option", default, alias = "voteAmountCap")]
    pub vote_amount_cap: Option<BigUint>,
}

/// Tokens accepted on one chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChainConfig {
    pub id: ChainId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

impl ChainConfig {
    /// Find a token by address, ignoring case.
    pub fn token(&self, address: &str) -> Option<&TokenConfig> {
        self.tokens
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(address))
    }
}

/// Identifies one round: `(chainId, roundId)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct RoundKey {
    pub chain_id: ChainId,
    pub round_id: String,
}

impl RoundKey {
    pub fn new(chain_id: ChainId, round_id: impl Into<String>) -> Self {
        Self {
            chain_id,
            round_id: round_id.into(),
        }
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain_id, self.round_id)
    }
}

/// A vote after coefficient resolution, ready for capping and aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct VoteWithCoefficient {
    pub vote: Vote,
    pub coefficient: f64,
}

/// One coefficient-weighted contribution in round-token units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub voter: String,
    pub application_id: String,
    pub amount: BigUint,
}

/// Tuning passed through to the allocation algorithm.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOptions {
    /// Contributions below this amount (round-token units) are ignored.
    #[serde(with = "crate::amount")]
    pub min_contribution: BigUint,
    /// Per-application ceiling on the matched amount.
    #[serde(with = "crate::amount::option", default)]
    pub matching_cap_amount: Option<BigUint>,
    /// Leave raw matches unscaled when their total is below the pool instead
    /// of scaling them up to it.
    #[serde(default)]
    pub ignore_saturation: bool,
}

/// Allocation algorithm output for one application.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMatch {
    #[serde(with = "crate::amount")]
    pub total_received: BigUint,
    pub contributions_count: usize,
    #[serde(with = "crate::amount")]
    pub matched_without_cap: BigUint,
    #[serde(with = "crate::amount")]
    pub cap_overflow: BigUint,
    #[serde(with = "crate::amount")]
    pub matched: BigUint,
}

/// Allocation output keyed by application id.
pub type Allocation = BTreeMap<String, ProjectMatch>;

/// A project's final matched amount with its display metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub application_id: String,
    pub project_id: String,
    pub project_name: String,
    pub payout_address: String,
    #[serde(with = "crate::amount")]
    pub total_received: BigUint,
    pub contributions_count: usize,
    #[serde(with = "crate::amount")]
    pub matched_without_cap: BigUint,
    #[serde(with = "crate::amount")]
    pub cap_overflow: BigUint,
    #[serde(with = "crate::amount")]
    pub matched: BigUint,
    #[serde(rename = "matchedUSD")]
    pub matched_usd: f64,
}

/// A hypothetical contribution used for matching estimates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PotentialVote {
    pub voter: String,
    pub application_id: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: f64,
}

/// Change in an application's match if the potential votes were cast.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchingEstimate {
    pub application_id: String,
    #[serde(with = "crate::amount")]
    pub matched_before: BigUint,
    #[serde(with = "crate::amount")]
    pub matched_after: BigUint,
    #[serde(serialize_with = "serialize_signed", deserialize_with = "deserialize_signed")]
    pub difference: BigInt,
}

fn serialize_signed<S: serde::Serializer>(v: &BigInt, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_str_radix(10))
}

fn deserialize_signed<'de, D: serde::Deserializer<'de>>(d: D) -> Result<BigInt, D::Error> {
    let s = String::deserialize(d)?;
    s.parse::<BigInt>().map_err(serde::de::Error::custom)
}
