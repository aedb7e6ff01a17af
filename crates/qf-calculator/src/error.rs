//! Calculator errors.
//!
//! Every pipeline stage has its own error enum in `qf_core::error`;
//! [`CalculatorError`] wraps them so a failed request names the stage that
//! failed and whether the caller or the server is at fault.

use thiserror::Error;

use qf_core::error::{
    AllocationError, CoefficientError, CurrencyError, DataError, OverridesError, VoteCapError,
};
use qf_core::types::ChainId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to load config: {0}")] Load(String),
    #[error("invalid config: {0}")] Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("allocation worker panicked: {0}")] WorkerPanicked(String),
    #[error("allocation worker exited without replying")] WorkerTerminated,
    #[error("allocation pool is closed")] PoolClosed,
    #[error("failed to spawn allocation worker: {0}")] Spawn(String),
    #[error(transparent)] Allocation(#[from] AllocationError),
}

/// Who is at fault for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request data or configuration the caller can fix.
    Input,
    /// The server failed while computing.
    Computation,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculatorError {
    #[error("request: unknown chain {0}")] UnknownChain(ChainId),
    #[error("request: {0}")] InvalidRequest(String),
    #[error("config: {0}")] Config(#[from] ConfigError),
    #[error("load: {0}")] Data(#[from] DataError),
    #[error("overrides: {0}")] Overrides(#[from] OverridesError),
    #[error("coefficients: {0}")] Coefficient(#[from] CoefficientError),
    #[error("vote cap: {0}")] VoteCap(#[from] VoteCapError),
    #[error("currency: {0}")] Currency(#[from] CurrencyError),
    #[error("allocation: {0}")] Dispatch(#[from] DispatchError),
    #[error("aggregation: task failed: {0}")] AggregationTask(String),
}

impl CalculatorError {
    /// Pipeline stage the error came from.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnknownChain(_) | Self::InvalidRequest(_) => "request",
            Self::Config(_) => "config",
            Self::Data(_) => "load",
            Self::Overrides(_) => "overrides",
            Self::Coefficient(_) => "coefficients",
            Self::VoteCap(_) => "vote cap",
            Self::Currency(_) => "currency",
            Self::Dispatch(_) => "allocation",
            Self::AggregationTask(_) => "aggregation",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownChain(_)
            | Self::InvalidRequest(_)
            | Self::Config(_)
            | Self::Overrides(_)
            | Self::VoteCap(_) => ErrorKind::Input,
            Self::Data(DataError::Io { .. }) => ErrorKind::Computation,
            Self::Data(_) => ErrorKind::Input,
            Self::Coefficient(CoefficientError::NonFinite { .. }) => ErrorKind::Computation,
            Self::Coefficient(_) => ErrorKind::Input,
            Self::Currency(CurrencyError::NonFinite) => ErrorKind::Computation,
            Self::Currency(_) => ErrorKind::Input,
            Self::Dispatch(_) | Self::AggregationTask(_) => ErrorKind::Computation,
        }
    }

    /// HTTP-style status for a boundary layer: 400 for input, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Input => 400,
            ErrorKind::Computation => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_input_error() {
        let err: CalculatorError = DataError::FileNotFound {
            description: "votes".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.stage(), "load");
        assert_eq!(err.to_string(), "load: file not found: votes");
    }

    #[test]
    fn io_failure_is_computation_error() {
        let err: CalculatorError = DataError::Io {
            path: "1/rounds/r/votes.json".into(),
            message: "permission denied".into(),
        }
        .into();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn override_row_error_names_stage_and_row() {
        let err: CalculatorError = OverridesError::InvalidRow {
            row: 2,
            value: "abc".into(),
        }
        .into();
        assert_eq!(err.stage(), "overrides");
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn worker_failures_are_computation_errors() {
        for e in [
            DispatchError::WorkerPanicked("boom".into()),
            DispatchError::WorkerTerminated,
            DispatchError::PoolClosed,
            DispatchError::Allocation(AllocationError::Failed("x".into())),
        ] {
            let err = CalculatorError::from(e);
            assert_eq!(err.kind(), ErrorKind::Computation);
            assert_eq!(err.stage(), "allocation");
        }
    }

    #[test]
    fn unknown_token_is_input_error() {
        let err = CalculatorError::from(VoteCapError::UnknownToken("0xabc".into()));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.stage(), "vote cap");
    }

    #[test]
    fn aggregation_task_failure_is_computation_error() {
        let err = CalculatorError::AggregationTask("task panicked".into());
        assert_eq!(err.stage(), "aggregation");
        assert_eq!(err.status_code(), 500);
    }
}
