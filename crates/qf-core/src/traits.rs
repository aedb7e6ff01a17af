//! Trait interfaces at the edges of the matching pipeline.
//!
//! - [`DataProvider`]: loads round input files (qf-data implements)
//! - [`Cache`]: byte-valued key-value store (qf-data implements)
//! - [`ReputationProvider`]: voter passport lookup (qf-data implements)
//! - [`AllocationAlgorithm`]: the QF summation itself (qf-linear implements)

use bytes::Bytes;
use num_bigint::BigUint;

use crate::aggregate::AggregatedContributions;
use crate::error::{AllocationError, DataError};
use crate::types::{Allocation, AllocationOptions, PassportScore};

/// Source of round input files.
///
/// `description` is a human-readable name used in errors ("votes",
/// "applications"); `path` is relative to the provider's root.
pub trait DataProvider: Send + Sync {
    /// Load the raw bytes at `path`. Missing files fail with
    /// [`DataError::FileNotFound`] naming `description`.
    fn load_raw(&self, description: &str, path: &str) -> Result<Bytes, DataError>;
}

/// Load and decode a JSON array of `T` through any [`DataProvider`].
pub fn load_file<T: serde::de::DeserializeOwned>(
    provider: &dyn DataProvider,
    description: &str,
    path: &str,
) -> Result<Vec<T>, DataError> {
    let raw = provider.load_raw(description, path)?;
    serde_json::from_slice(&raw).map_err(|e| DataError::Parse {
        description: description.to_string(),
        message: e.to_string(),
    })
}

/// Key-value store with bytes as the serialization boundary.
///
/// Implementations decide their own expiry policy; callers must treat a
/// missing key as a normal outcome.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Bytes>;

    fn set(&self, key: &str, value: Bytes);
}

/// Per-voter reputation lookup.
pub trait ReputationProvider: Send + Sync {
    /// Passport record for `address`, or `None` if the voter has no score.
    fn score(&self, address: &str) -> Result<Option<PassportScore>, DataError>;
}

/// The quadratic-funding allocation function.
///
/// Must be pure: identical inputs produce identical allocations. It runs on
/// dispatcher worker threads, never on the caller's task.
pub trait AllocationAlgorithm: Send + Sync {
    fn compute(
        &self,
        contributions: &AggregatedContributions,
        match_pool: &BigUint,
        options: &AllocationOptions,
    ) -> Result<Allocation, AllocationError>;
}
