//! Process-wide cache of aggregated round contributions.
//!
//! Entries are keyed by [`RoundKey`] and expire a fixed TTL after they were
//! stored. The map is sharded ([`DashMap`]) so reads of different rounds never
//! block each other; inserts that may evict are serialized behind one lock.
//! When full, the entry closest to expiry is evicted.
//!
//! [`lock_key`](RoundContributionsCache::lock_key) hands out a per-round
//! in-flight guard so that concurrent requests for the same round wait for
//! one aggregation instead of each doing their own.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use qf_core::aggregate::AggregatedContributions;
use qf_core::types::RoundKey;

use crate::config::RoundCacheConfig;

/// A cached aggregation and the passport setting it was computed under.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundContributions {
    pub passport_enabled: bool,
    pub contributions: Arc<AggregatedContributions>,
}

#[derive(Debug)]
struct Entry {
    value: RoundContributions,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct RoundContributionsCache {
    entries: DashMap<RoundKey, Entry>,
    inflight: DashMap<RoundKey, Arc<tokio::sync::Mutex<()>>>,
    capacity: usize,
    ttl: Duration,
    evict_lock: Mutex<()>,
}

impl RoundContributionsCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            capacity,
            ttl,
            evict_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &RoundCacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    /// Cached value for `key`, if present and unexpired. Expired entries are
    /// dropped on the way out.
    pub fn get(&self, key: &RoundKey) -> Option<RoundContributions> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(e) if e.expires_at > now => return Some(e.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
            debug!(round = %key, "round_cache: entry expired");
        }
        None
    }

    /// Insert or replace `key`. Purges expired entries first, then evicts the
    /// entry nearest expiry while the cache is full.
    pub fn set(&self, key: RoundKey, value: RoundContributions) {
        if self.capacity == 0 {
            return;
        }

        let _evicting = self.evict_lock.lock();
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                let victim = self
                    .entries
                    .iter()
                    .min_by_key(|e| e.expires_at)
                    .map(|e| e.key().clone());
                match victim {
                    Some(victim) => {
                        self.entries.remove(&victim);
                        debug!(round = %victim, "round_cache: evicted");
                    }
                    None => break,
                }
            }
        }

        debug!(round = %key, "round_cache: stored");
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Wait until no other holder is aggregating `key`, then claim it.
    pub async fn lock_key(&self, key: &RoundKey) -> KeyGuard<'_> {
        let mutex = self.inflight.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            cache: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rounds that currently have an in-flight marker.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    #[cfg(test)]
    fn backdate(&self, key: &RoundKey, by: Duration) {
        if let Some(mut e) = self.entries.get_mut(key) {
            e.expires_at -= by;
        }
    }
}

/// In-flight marker for one round. Released on drop.
pub struct KeyGuard<'a> {
    cache: &'a RoundContributionsCache,
    key: RoundKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody is waiting on this round.
        self.cache
            .inflight
            .remove_if(&self.key, |_, m| Arc::strong_count(m) == 1);
    }
}
