//! Cross-crate test suite for qf-match.
//!
//! Integration tests under `tests/` run the whole pipeline against round
//! fixtures written to temporary directories: passport-weighted matching,
//! overrides, vote caps, failure propagation, and concurrent requests
//! sharing the round cache and the allocation workers.

pub mod helpers;
