//! Filesystem data provider and the round file layout.
//!
//! ```text
//! <root>/
//!   passport_scores.json
//!   <chainId>/rounds/<roundId>/votes.json
//!   <chainId>/rounds/<roundId>/applications.json
//! ```

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use qf_core::constants::PASSPORT_SCORES_FILE;
use qf_core::error::DataError;
use qf_core::traits::DataProvider;
use qf_core::types::ChainId;

/// Relative path of a round's votes file.
pub fn votes_path(chain_id: ChainId, round_id: &str) -> String {
    format!("{chain_id}/rounds/{round_id}/votes.json")
}

/// Relative path of a round's applications file.
pub fn applications_path(chain_id: ChainId, round_id: &str) -> String {
    format!("{chain_id}/rounds/{round_id}/applications.json")
}

/// Relative path of the passport score snapshot.
pub fn passport_scores_path() -> String {
    PASSPORT_SCORES_FILE.to_string()
}

/// Reads files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileDataProvider {
    root: PathBuf,
}

impl FileDataProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` under the root. Paths escaping the root resolve to
    /// `None` and read as missing.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }
        Some(self.root.join(rel))
    }
}

impl DataProvider for FileDataProvider {
    fn load_raw(&self, description: &str, path: &str) -> Result<Bytes, DataError> {
        let not_found = || DataError::FileNotFound {
            description: description.to_string(),
        };
        let full = self.resolve(path).ok_or_else(not_found)?;

        match std::fs::read(&full) {
            Ok(data) => {
                debug!(path = %full.display(), bytes = data.len(), "data_provider: loaded {description}");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(DataError::Io {
                path: full.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}
