//! Passport score snapshot.
//!
//! Scores are loaded once into an address-indexed map and served read-only,
//! so every lookup within a request sees the same snapshot.

use std::collections::HashMap;

use tracing::info;

use qf_core::error::DataError;
use qf_core::traits::{load_file, DataProvider, ReputationProvider};
use qf_core::types::PassportScore;

use crate::provider::passport_scores_path;

/// Address-indexed passport scores. Addresses compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PassportStore {
    by_address: HashMap<String, PassportScore>,
}

impl PassportStore {
    /// Load `passport_scores.json` through `provider`.
    pub fn load(provider: &dyn DataProvider) -> Result<Self, DataError> {
        let scores: Vec<PassportScore> =
            load_file(provider, "passport scores", &passport_scores_path())?;
        let store = Self::from_scores(scores);
        info!(count = store.len(), "passport: loaded score snapshot");
        Ok(store)
    }

    /// Build from records; a later record for the same address wins.
    pub fn from_scores(scores: impl IntoIterator<Item = PassportScore>) -> Self {
        let by_address = scores
            .into_iter()
            .map(|s| (s.address.to_lowercase(), s))
            .collect();
        Self { by_address }
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

impl ReputationProvider for PassportStore {
    fn score(&self, address: &str) -> Result<Option<PassportScore>, DataError> {
        Ok(self.by_address.get(&address.to_lowercase()).cloned())
    }
}
