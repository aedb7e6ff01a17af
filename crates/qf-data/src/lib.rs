//! # qf-data: Round input loading and caching.
//!
//! - [`provider::FileDataProvider`]: reads round files from a data directory
//! - [`cache::MemoryCache`]: in-memory [`Cache`](qf_core::traits::Cache)
//! - [`cached::CachedDataProvider`]: memoizing decorator over any provider
//! - [`passport::PassportStore`]: passport score snapshot lookup

pub mod cache;
pub mod cached;
pub mod passport;
pub mod provider;

pub use cache::MemoryCache;
pub use cached::CachedDataProvider;
pub use passport::PassportStore;
pub use provider::FileDataProvider;
