//! Fixed-point token/fiat conversion.
//!
//! Prices and fiat amounts are turned into integers by scaling with
//! `10^price_decimals` and **truncating**; every intermediate division
//! truncates as well. Rounding is never used, so conversions are biased
//! toward zero by design of the payout math and that bias must stay stable.
//!
//! Round trips are lossy. For any token amount `x`,
//! `fiat_to_token(token_to_fiat(x))` is at most `x` and falls short by less
//! than `2 * 10^token_decimals / price_fixed + 1` token units: each of the two
//! truncations can drop up to one `10^-price_decimals` fiat unit.

use num_bigint::BigUint;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::error::CurrencyError;

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// `trunc(value * 10^decimals)` as an integer. Rejects negative and
/// non-finite input.
pub fn to_fixed(value: f64, decimals: u32) -> Result<BigUint, CurrencyError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CurrencyError::InvalidInput(value));
    }
    let scaled = value * 10f64.powi(decimals as i32);
    BigUint::from_f64(scaled.trunc()).ok_or(CurrencyError::NonFinite)
}

/// Fiat value of `token_amount` (smallest token units) at `price` per whole token.
pub fn token_to_fiat(
    token_amount: &BigUint,
    token_decimals: u32,
    price: f64,
    price_decimals: u32,
) -> Result<f64, CurrencyError> {
    let price_fixed = to_fixed(price, price_decimals)?;
    let fiat_fixed = token_amount * price_fixed / pow10(token_decimals);

    let fiat = fiat_fixed.to_f64().ok_or(CurrencyError::NonFinite)?
        / 10f64.powi(price_decimals as i32);
    if !fiat.is_finite() {
        return Err(CurrencyError::NonFinite);
    }
    Ok(fiat)
}

/// Token amount (smallest units) worth `fiat_amount` at `price` per whole token.
pub fn fiat_to_token(
    fiat_amount: f64,
    price: f64,
    token_decimals: u32,
    price_decimals: u32,
) -> Result<BigUint, CurrencyError> {
    let fiat_fixed = to_fixed(fiat_amount, price_decimals)?;
    if fiat_fixed.is_zero() {
        return Ok(BigUint::zero());
    }

    let price_fixed = to_fixed(price, price_decimals)?;
    if price_fixed.is_zero() {
        return Err(CurrencyError::ZeroPrice {
            decimals: price_decimals,
        });
    }

    Ok(fiat_fixed * pow10(token_decimals) / price_fixed)
}
