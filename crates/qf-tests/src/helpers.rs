//! Shared fixtures for the integration tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use num_bigint::BigUint;
use parking_lot::Mutex;
use serde::Serialize;
use tempfile::TempDir;

use qf_calculator::{CalculationRequest, CalculatorConfig, DispatcherConfig};
use qf_core::aggregate::AggregatedContributions;
use qf_core::error::{AllocationError, DataError};
use qf_core::traits::{AllocationAlgorithm, DataProvider};
use qf_core::types::{
    Allocation, AllocationOptions, Application, ApplicationStatus, ChainConfig, PassportEvidence,
    PassportScore, TokenConfig, Vote,
};
use qf_data::provider::{applications_path, votes_path, FileDataProvider};
use qf_linear::LinearQf;

pub const CHAIN_ID: u64 = 10;
pub const ROUND_ID: &str = "0xround";
pub const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
pub const ETH: &str = "0x0000000000000000000000000000000000000000";

/// A temporary data directory laid out the way `FileDataProvider` reads it.
pub struct RoundFixture {
    dir: TempDir,
}

impl RoundFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_votes(&self, round_id: &str, votes: &[Vote]) {
        self.write(&votes_path(CHAIN_ID, round_id), votes);
    }

    pub fn write_applications(&self, round_id: &str, applications: &[Application]) {
        self.write(&applications_path(CHAIN_ID, round_id), applications);
    }

    pub fn write_passports(&self, scores: &[PassportScore]) {
        self.write("passport_scores.json", scores);
    }

    fn write<T: Serialize + ?Sized>(&self, rel: &str, value: &T) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    }
}

impl Default for RoundFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A DAI vote where raw amount and round-token amount are equal.
pub fn vote(id: &str, voter: &str, application_id: &str, amount: u64) -> Vote {
    Vote {
        id: id.to_string(),
        voter: voter.to_string(),
        application_id: application_id.to_string(),
        project_id: format!("project-{application_id}"),
        token: DAI.to_string(),
        amount: BigUint::from(amount),
        amount_usd: amount as f64,
        amount_round_token: BigUint::from(amount),
        passport: None,
    }
}

pub fn application(id: &str, status: ApplicationStatus) -> Application {
    Application {
        id: id.to_string(),
        project_id: format!("project-{id}"),
        status,
        project_name: format!("Project {id}"),
        payout_address: format!("0xpayout{id}"),
    }
}

pub fn approved(id: &str) -> Application {
    application(id, ApplicationStatus::Approved)
}

pub fn passport(address: &str, raw_score: f64) -> PassportScore {
    PassportScore {
        address: address.to_string(),
        score: None,
        evidence: Some(PassportEvidence {
            raw_score,
            threshold: Some(15.0),
            success: raw_score >= 15.0,
        }),
    }
}

/// Chain 10 with DAI (18 decimals, optional cap) and ETH (uncapped).
pub fn chain(dai_cap: Option<BigUint>) -> ChainConfig {
    ChainConfig {
        id: CHAIN_ID,
        name: "optimism".to_string(),
        tokens: vec![
            TokenConfig {
                address: DAI.to_string(),
                code: "DAI".to_string(),
                decimals: 18,
                vote_amount_cap: dai_cap,
            },
            TokenConfig {
                address: ETH.to_string(),
                code: "ETH".to_string(),
                decimals: 18,
                vote_amount_cap: None,
            },
        ],
    }
}

pub fn config(root: &Path) -> CalculatorConfig {
    CalculatorConfig {
        data_dir: root.to_path_buf(),
        dispatcher: DispatcherConfig {
            workers: 2,
            queue_capacity: 8,
        },
        chains: vec![chain(None)],
        ..CalculatorConfig::default()
    }
}

pub fn request() -> CalculationRequest {
    CalculationRequest {
        chain_id: CHAIN_ID,
        round_id: ROUND_ID.to_string(),
        match_pool: BigUint::from(1_000_000u32),
        min_contribution_usd: 0.0,
        matching_cap_percentage: None,
        passport_enabled: false,
        overrides: None,
        round_token: DAI.to_lowercase(),
        round_token_price_usd: 1.0,
    }
}

pub fn overrides_csv(body: &str) -> Option<Bytes> {
    Some(Bytes::from(body.to_string()))
}

/// Runs [`LinearQf`] and keeps a copy of every input it was given.
#[derive(Default)]
pub struct RecordingAlgorithm {
    seen: Mutex<Vec<AggregatedContributions>>,
}

impl RecordingAlgorithm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn last(&self) -> Option<AggregatedContributions> {
        self.seen.lock().last().cloned()
    }
}

impl AllocationAlgorithm for RecordingAlgorithm {
    fn compute(
        &self,
        contributions: &AggregatedContributions,
        match_pool: &BigUint,
        options: &AllocationOptions,
    ) -> Result<Allocation, AllocationError> {
        self.seen.lock().push(contributions.clone());
        LinearQf.compute(contributions, match_pool, options)
    }
}

/// File provider that counts how often each kind of file is read.
pub struct CountingProvider {
    inner: FileDataProvider,
    votes: AtomicUsize,
    applications: AtomicUsize,
}

impl CountingProvider {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            inner: FileDataProvider::new(root),
            votes: AtomicUsize::new(0),
            applications: AtomicUsize::new(0),
        })
    }

    pub fn votes_reads(&self) -> usize {
        self.votes.load(Ordering::SeqCst)
    }

    pub fn applications_reads(&self) -> usize {
        self.applications.load(Ordering::SeqCst)
    }
}

impl DataProvider for CountingProvider {
    fn load_raw(&self, description: &str, path: &str) -> Result<Bytes, DataError> {
        if path.ends_with("votes.json") {
            self.votes.fetch_add(1, Ordering::SeqCst);
        } else if path.ends_with("applications.json") {
            self.applications.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.load_raw(description, path)
    }
}
