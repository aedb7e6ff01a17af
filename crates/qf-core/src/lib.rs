//! # qf-core
//! Foundation types, traits, and pure pipeline stages for qf-match.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! the trait contracts it defines for the outer crates:
//! - [`coefficient`]: reputation score to match coefficient
//! - [`overrides`]: CSV coefficient overrides
//! - [`vote_cap`]: per-token round-token rescaling
//! - [`currency`]: fixed-point token/fiat conversion
//! - [`aggregate`]: per-application contribution aggregation

pub mod aggregate;
pub mod amount;
pub mod coefficient;
pub mod constants;
pub mod currency;
pub mod error;
pub mod overrides;
pub mod traits;
pub mod types;
pub mod vote_cap;

pub use aggregate::{AggregatedContributions, ProjectContributions};
pub use overrides::CoefficientOverrides;
