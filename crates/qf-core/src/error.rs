//! Error types for the matching pipeline stages.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("file not found: {description}")] FileNotFound { description: String },
    #[error("failed to read {path}: {message}")] Io { path: String, message: String },
    #[error("failed to parse {description}: {message}")] Parse { description: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverridesError {
    #[error("column not found: {0}")] ColumnNotFound(String),
    #[error("invalid coefficient in row {row}: {value:?}")] InvalidRow { row: usize, value: String },
    #[error("malformed overrides file: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoefficientError {
    #[error("invalid score band: min {min} must be below max {max}")] InvalidScoreBand { min: f64, max: f64 },
    #[error("match percentage out of range [0, 100]: {0}")] PercentageOutOfRange(f64),
    #[error("non-finite coefficient for vote {vote_id}")] NonFinite { vote_id: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteCapError {
    #[error("unknown token: {0}")] UnknownToken(String),
    #[error("vote {vote_id} has zero amount under a cap")] ZeroAmount { vote_id: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurrencyError {
    #[error("invalid conversion input: {0}")] InvalidInput(f64),
    #[error("price truncates to zero at {decimals} decimals")] ZeroPrice { decimals: u32 },
    #[error("non-finite conversion result")] NonFinite,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("allocation failed: {0}")] Failed(String),
}
