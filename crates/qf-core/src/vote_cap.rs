//! Per-token vote cap.
//!
//! When a token carries a `voteAmountCap`, a vote's round-token amount is
//! rescaled so that `amount : amountRoundToken == voteAmountCap : amountRoundToken'`:
//!
//! `amountRoundToken' = amountRoundToken * voteAmountCap / amount`
//!
//! The formula is applied as-is for every vote in a capped token. Integer
//! division truncates toward zero. `amount` and `amountUSD` are left untouched.

use num_traits::Zero;

use crate::error::VoteCapError;
use crate::types::{ChainConfig, TokenConfig, Vote};

/// Apply the vote cap of the vote's token on `chain`.
///
/// Unknown tokens are an error rather than a pass-through.
pub fn apply_vote_cap(chain: &ChainConfig, vote: &Vote) -> Result<Vote, VoteCapError> {
    let token = chain
        .token(&vote.token)
        .ok_or_else(|| VoteCapError::UnknownToken(vote.token.clone()))?;
    apply_token_cap(token, vote)
}

/// Apply an already-resolved token config to a vote.
pub fn apply_token_cap(token: &TokenConfig, vote: &Vote) -> Result<Vote, VoteCapError> {
    let Some(cap) = &token.vote_amount_cap else {
        return Ok(vote.clone());
    };

    if vote.amount.is_zero() {
        return Err(VoteCapError::ZeroAmount {
            vote_id: vote.id.clone(),
        });
    }

    let mut capped = vote.clone();
    capped.amount_round_token = &vote.amount_round_token * cap / &vote.amount;
    Ok(capped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    fn chain(cap: Option<BigUint>) -> ChainConfig {
        ChainConfig {
            id: 1,
            name: "mainnet".into(),
            tokens: vec![TokenConfig {
                address: DAI.into(),
                code: "DAI".into(),
                decimals: 18,
                vote_amount_cap: cap,
            }],
        }
    }

    fn vote(amount: u64, amount_round_token: u64) -> Vote {
        Vote {
            id: "vote-1".into(),
            voter: "0xvoter".into(),
            application_id: "0".into(),
            project_id: "p0".into(),
            token: DAI.to_lowercase(),
            amount: BigUint::from(amount),
            amount_usd: 12.5,
            amount_round_token: BigUint::from(amount_round_token),
            passport: None,
        }
    }

    #[test]
    fn uncapped_token_passes_through() {
        let v = vote(1000, 500);
        let out = apply_vote_cap(&chain(None), &v).unwrap();
        assert_eq!(out, v);
    }

    #[test]
    fn cap_rescales_round_token_amount() {
        // 500 * 10e18 / 1000 = 5e18
        let cap = BigUint::from(10u64) * BigUint::from(10u64).pow(18);
        let v = vote(1000, 500);
        let out = apply_vote_cap(&chain(Some(cap)), &v).unwrap();
        assert_eq!(out.amount_round_token, BigUint::from(5u64) * BigUint::from(10u64).pow(18));
        assert_eq!(out.amount, v.amount);
        assert_eq!(out.amount_usd, v.amount_usd);
    }

    #[test]
    fn cap_division_truncates() {
        // 10 * 7 / 3 = 23.33.. -> 23
        let out = apply_vote_cap(&chain(Some(BigUint::from(7u32))), &vote(3, 10)).unwrap();
        assert_eq!(out.amount_round_token, BigUint::from(23u32));
    }

    #[test]
    fn unknown_token_is_error() {
        let mut v = vote(1000, 500);
        v.token = "0x0000000000000000000000000000000000000001".into();
        let err = apply_vote_cap(&chain(None), &v).unwrap_err();
        assert_eq!(err, VoteCapError::UnknownToken(v.token.clone()));
    }

    #[test]
    fn zero_amount_under_cap_is_error() {
        let err = apply_vote_cap(&chain(Some(BigUint::from(1u32))), &vote(0, 500)).unwrap_err();
        assert_eq!(
            err,
            VoteCapError::ZeroAmount {
                vote_id: "vote-1".into()
            }
        );
    }

    #[test]
    fn zero_amount_uncapped_passes() {
        assert!(apply_vote_cap(&chain(None), &vote(0, 0)).is_ok());
    }
}
