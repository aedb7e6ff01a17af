//! Calculation constants shared across the workspace.

/// Fixed-point scale used when applying a floating coefficient to an
/// integer round-token amount: `amount * trunc(coefficient * 10_000) / 10_000`.
pub const COEFFICIENT_PRECISION: u64 = 10_000;

/// Decimal places kept when a USD price or USD amount is turned into a
/// fixed-point integer.
pub const USD_PRICE_DECIMALS: u32 = 8;

/// Default number of rounds kept in the round contribution cache.
pub const DEFAULT_ROUND_CACHE_CAPACITY: usize = 10;

/// Default lifetime of a round contribution cache entry, in seconds.
pub const DEFAULT_ROUND_CACHE_TTL_SECS: u64 = 300;

/// Default lower edge of the passport score band.
pub const DEFAULT_SCORE_MIN: f64 = 15.0;

/// Default upper edge of the passport score band.
pub const DEFAULT_SCORE_MAX: f64 = 25.0;

/// Default match percentage at the lower edge of the band.
pub const DEFAULT_MATCH_PCT_MIN: f64 = 50.0;

/// Default match percentage at the upper edge of the band.
pub const DEFAULT_MATCH_PCT_MAX: f64 = 100.0;

/// Key prefix used by the caching data provider.
pub const DATA_PROVIDER_CACHE_PREFIX: &str = "data-provider:";

/// File name of the global passport score snapshot.
pub const PASSPORT_SCORES_FILE: &str = "passport_scores.json";
