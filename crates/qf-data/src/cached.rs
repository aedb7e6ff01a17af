//! Caching decorator for any [`DataProvider`].
//!
//! Lookups go to the injected [`Cache`] under `data-provider:<path>` first.
//! On a hit the inner provider is never touched; on a miss the inner result
//! is stored before being returned. Failures are not cached. Expiry is
//! entirely the injected cache's business.
//!
//! Only file I/O is saved: values are cached as raw bytes, so typed loads
//! through [`load_file`](qf_core::traits::load_file) still decode on every
//! hit. Decoded rounds are reused through the calculator's round cache.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use qf_core::constants::DATA_PROVIDER_CACHE_PREFIX;
use qf_core::error::DataError;
use qf_core::traits::{Cache, DataProvider};

pub struct CachedDataProvider {
    inner: Arc<dyn DataProvider>,
    cache: Arc<dyn Cache>,
}

impl CachedDataProvider {
    pub fn new(inner: Arc<dyn DataProvider>, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }

    /// Cache key for a provider path.
    pub fn cache_key(path: &str) -> String {
        format!("{DATA_PROVIDER_CACHE_PREFIX}{path}")
    }
}

impl DataProvider for CachedDataProvider {
    fn load_raw(&self, description: &str, path: &str) -> Result<Bytes, DataError> {
        let key = Self::cache_key(path);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "data_provider: cache hit");
            return Ok(hit);
        }

        debug!(%key, "data_provider: cache miss");
        let value = self.inner.load_raw(description, path)?;
        self.cache.set(&key, value.clone());
        Ok(value)
    }
}
