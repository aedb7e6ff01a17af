//! # qf-calculator: Matching calculation pipeline.
//!
//! Ties the pure stages of `qf-core` to round data from `qf-data`:
//!
//! - [`calculator::Calculator`]: orchestrates one request end to end
//! - [`round_cache::RoundContributionsCache`]: TTL + capacity bounded cache
//!   of aggregated round contributions
//! - [`dispatcher::AllocationDispatcher`]: worker threads that run the
//!   allocation algorithm off the async runtime
//! - [`votes`]: application filter, coefficient resolution, vote cap
//! - [`config::CalculatorConfig`]: defaults and file/env loading

pub mod calculator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod round_cache;
pub mod votes;

pub use calculator::{CalculationRequest, Calculator};
pub use config::{CalculatorConfig, DispatcherConfig, RoundCacheConfig};
pub use dispatcher::{AllocationDispatcher, AllocationRequest};
pub use error::{CalculatorError, ConfigError, DispatchError, ErrorKind};
pub use round_cache::{RoundContributions, RoundContributionsCache};
