//! In-memory [`Cache`] implementation.
//!
//! Backed by a sharded [`DashMap`] so concurrent readers and writers on
//! different keys do not contend. With a TTL, expired entries are dropped on
//! read and swept on every write, so the map only holds live entries plus
//! whatever expired since the last write. Without one, entries live until
//! overwritten.

use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

use qf_core::traits::Cache;

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    stored_at: Instant,
}

/// Concurrent byte cache with optional per-entry TTL.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Cache without expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache whose entries expire `ttl` after they were stored.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        let hit = self.entries.get(key).map(|e| (e.value.clone(), self.is_expired(&e)));
        match hit {
            Some((value, false)) => Some(value),
            Some((_, true)) => {
                self.entries.remove_if(key, |_, e| self.is_expired(e));
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Bytes) {
        if self.ttl.is_some() {
            self.entries.retain(|_, e| !self.is_expired(e));
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}
