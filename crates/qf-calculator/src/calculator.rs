//! Calculator orchestrator.
//!
//! Drives one request through the pipeline: resolve the round token, load
//! applications and votes, resolve coefficients, cap, aggregate (through the
//! round cache when no overrides are given), dispatch the allocation to the
//! worker pool, then merge the result with application metadata.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use num_bigint::{BigInt, BigUint};
use tracing::{debug, info, warn};

use qf_core::aggregate::AggregatedContributions;
use qf_core::coefficient::passport_coefficient;
use qf_core::constants::USD_PRICE_DECIMALS;
use qf_core::currency::{fiat_to_token, to_fixed, token_to_fiat};
use qf_core::error::DataError;
use qf_core::overrides::parse_coefficient_overrides;
use qf_core::traits::{load_file, AllocationAlgorithm, Cache, DataProvider, ReputationProvider};
use qf_core::types::{
    AllocationOptions, Application, ChainConfig, ChainId, MatchResult, MatchingEstimate,
    PotentialVote, ProjectMatch, ProportionalMatchOptions, RoundKey, TokenConfig, Vote,
};
use qf_data::provider::{applications_path, votes_path};
use qf_data::{CachedDataProvider, FileDataProvider, MemoryCache, PassportStore};

use crate::config::CalculatorConfig;
use crate::dispatcher::{AllocationDispatcher, AllocationRequest};
use crate::error::CalculatorError;
use crate::round_cache::{RoundContributions, RoundContributionsCache};
use crate::votes::{
    aggregate, index_applications, votes_with_coefficients, weighted_contribution, VoteContext,
};

/// Percent with four fixed decimals: `pct * 10^4 / (100 * 10^4)`.
const CAP_PERCENT_DECIMALS: u32 = 4;
const CAP_PERCENT_SCALE: u32 = 1_000_000;

/// One matching calculation for a round.
#[derive(Debug, Clone)]
pub struct CalculationRequest {
    pub chain_id: ChainId,
    pub round_id: String,
    /// Matching funds in round-token units.
    pub match_pool: BigUint,
    /// Contributions worth less than this (in USD) are not matched.
    pub min_contribution_usd: f64,
    /// Per-application ceiling as a percentage of the pool.
    pub matching_cap_percentage: Option<f64>,
    pub passport_enabled: bool,
    /// Raw coefficient overrides CSV.
    pub overrides: Option<Bytes>,
    /// Address of the round's matching token.
    pub round_token: String,
    pub round_token_price_usd: f64,
}

impl CalculationRequest {
    pub fn round_key(&self) -> RoundKey {
        RoundKey::new(self.chain_id, self.round_id.clone())
    }
}

pub struct Calculator {
    config: CalculatorConfig,
    data: Arc<dyn DataProvider>,
    reputation: Option<Arc<dyn ReputationProvider>>,
    round_cache: Arc<RoundContributionsCache>,
    dispatcher: Arc<AllocationDispatcher>,
}

impl Calculator {
    /// Wire a calculator from explicit collaborators. `data` should already be
    /// wrapped in a [`CachedDataProvider`] if caching is wanted. Without a
    /// `reputation` provider, passport-enabled requests fail.
    pub fn new(
        config: CalculatorConfig,
        data: Arc<dyn DataProvider>,
        reputation: Option<Arc<dyn ReputationProvider>>,
        algorithm: Arc<dyn AllocationAlgorithm>,
    ) -> Result<Self, CalculatorError> {
        config.validate()?;
        let round_cache = Arc::new(RoundContributionsCache::from_config(&config.round_cache));
        let dispatcher = Arc::new(AllocationDispatcher::new(algorithm, &config.dispatcher)?);

        info!(
            chains = config.chains.len(),
            round_cache_capacity = config.round_cache.capacity,
            passport = reputation.is_some(),
            "calculator: initialized"
        );

        Ok(Self {
            config,
            data,
            reputation,
            round_cache,
            dispatcher,
        })
    }

    /// Standard wiring: files under `config.data_dir` behind an in-memory
    /// cache that expires no later than the round cache, passport scores from `passport_scores.json` when present.
    pub fn from_config(
        config: CalculatorConfig,
        algorithm: Arc<dyn AllocationAlgorithm>,
    ) -> Result<Self, CalculatorError> {
        let files = Arc::new(FileDataProvider::new(config.data_dir.clone()));
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::with_ttl(config.data_cache_ttl()));

        let reputation: Option<Arc<dyn ReputationProvider>> =
            match PassportStore::load(files.as_ref()) {
                Ok(store) => Some(Arc::new(store)),
                Err(DataError::FileNotFound { .. }) => {
                    warn!(data_dir = ?config.data_dir, "calculator: no passport scores, passport rounds disabled");
                    None
                }
                Err(e) => return Err(e.into()),
            };

        let data: Arc<dyn DataProvider> = Arc::new(CachedDataProvider::new(files, cache));
        Self::new(config, data, reputation, algorithm)
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    pub fn round_cache(&self) -> &RoundContributionsCache {
        &self.round_cache
    }

    /// Stop the allocation workers. Requests made afterwards fail.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }

    /// Compute matches for every approved application that received votes,
    /// ordered by application id.
    pub async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<Vec<MatchResult>, CalculatorError> {
        let started = Instant::now();
        let round = request.round_key();
        info!(
            %round,
            passport = request.passport_enabled,
            overrides = request.overrides.is_some(),
            "calculator: calculating matches"
        );

        let result = self.run_calculation(request).await;
        match &result {
            Ok(results) => info!(
                %round,
                projects = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "calculator: matches computed"
            ),
            Err(e) => warn!(%round, stage = e.stage(), error = %e, "calculator: calculation failed"),
        }
        result
    }

    async fn run_calculation(
        &self,
        request: &CalculationRequest,
    ) -> Result<Vec<MatchResult>, CalculatorError> {
        let (chain, token) = self.resolve_round(request)?;
        let applications = self.load_applications(request)?;
        let contributions = self.round_contributions(request, chain, &applications).await?;
        let options = self.allocation_options(request, token)?;

        let allocation = self
            .dispatcher
            .dispatch(AllocationRequest {
                contributions,
                match_pool: request.match_pool.clone(),
                options,
            })
            .await?;

        allocation
            .into_iter()
            .map(|(id, m)| merge_result(id, m, &applications, token, request.round_token_price_usd))
            .collect()
    }

    /// How each application's match would move if `potential` votes were
    /// added to the round.
    pub async fn estimate_matching(
        &self,
        request: &CalculationRequest,
        potential: &[PotentialVote],
    ) -> Result<Vec<MatchingEstimate>, CalculatorError> {
        let (chain, token) = self.resolve_round(request)?;
        let applications = self.load_applications(request)?;

        for vote in potential {
            let approved = applications
                .get(&vote.application_id)
                .is_some_and(Application::is_approved);
            if !approved {
                return Err(CalculatorError::InvalidRequest(format!(
                    "potential vote for unknown or unapproved application {}",
                    vote.application_id
                )));
            }
        }

        let current = self.round_contributions(request, chain, &applications).await?;
        let passport = self.passport_source(request)?;

        let mut combined = (*current).clone();
        for vote in potential {
            let amount = fiat_to_token(
                vote.amount_usd,
                request.round_token_price_usd,
                token.decimals,
                USD_PRICE_DECIMALS,
            )?;
            let coefficient = match &passport {
                Some(reputation) => passport_coefficient(
                    &self.config.proportional_match,
                    reputation.score(&vote.voter)?.as_ref(),
                ),
                None => 1.0,
            };
            combined.add(weighted_contribution(
                &vote.voter,
                &vote.application_id,
                &amount,
                coefficient,
            ));
        }

        let options = self.allocation_options(request, token)?;
        let before = AllocationRequest {
            contributions: current,
            match_pool: request.match_pool.clone(),
            options: options.clone(),
        };
        let after = AllocationRequest {
            contributions: Arc::new(combined),
            match_pool: request.match_pool.clone(),
            options,
        };
        let (before, after) =
            tokio::try_join!(self.dispatcher.dispatch(before), self.dispatcher.dispatch(after))?;

        let ids: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
        let estimates = ids
            .into_iter()
            .map(|id| {
                let matched_before = before.get(id).map(|m| m.matched.clone()).unwrap_or_default();
                let matched_after = after.get(id).map(|m| m.matched.clone()).unwrap_or_default();
                MatchingEstimate {
                    application_id: id.clone(),
                    difference: BigInt::from(matched_after.clone())
                        - BigInt::from(matched_before.clone()),
                    matched_before,
                    matched_after,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            round = %request.round_key(),
            potential = potential.len(),
            projects = estimates.len(),
            "calculator: matching estimated"
        );
        Ok(estimates)
    }

    fn resolve_round(
        &self,
        request: &CalculationRequest,
    ) -> Result<(&ChainConfig, &TokenConfig), CalculatorError> {
        let chain = self
            .config
            .chain(request.chain_id)
            .ok_or(CalculatorError::UnknownChain(request.chain_id))?;
        let token = chain.token(&request.round_token).ok_or_else(|| {
            CalculatorError::InvalidRequest(format!(
                "unknown round token {} on chain {}",
                request.round_token, request.chain_id
            ))
        })?;
        Ok((chain, token))
    }

    fn load_applications(
        &self,
        request: &CalculationRequest,
    ) -> Result<BTreeMap<String, Application>, CalculatorError> {
        let applications: Vec<Application> = load_file(
            self.data.as_ref(),
            "applications",
            &applications_path(request.chain_id, &request.round_id),
        )?;
        Ok(index_applications(applications))
    }

    fn passport_source(
        &self,
        request: &CalculationRequest,
    ) -> Result<Option<Arc<dyn ReputationProvider>>, CalculatorError> {
        if !request.passport_enabled {
            return Ok(None);
        }
        match &self.reputation {
            Some(reputation) => Ok(Some(reputation.clone())),
            None => Err(DataError::FileNotFound {
                description: "passport scores".into(),
            }
            .into()),
        }
    }

    /// Aggregated contributions for the round. Requests with overrides always
    /// recompute and leave the cache alone.
    async fn round_contributions(
        &self,
        request: &CalculationRequest,
        chain: &ChainConfig,
        applications: &BTreeMap<String, Application>,
    ) -> Result<Arc<AggregatedContributions>, CalculatorError> {
        if request.overrides.is_some() {
            return Ok(Arc::new(self.aggregate_round(request, chain, applications).await?));
        }

        let key = request.round_key();
        if let Some(hit) = self.cached(&key, request.passport_enabled) {
            return Ok(hit);
        }

        let _inflight = self.round_cache.lock_key(&key).await;
        // Someone else may have filled it while we waited.
        if let Some(hit) = self.cached(&key, request.passport_enabled) {
            return Ok(hit);
        }

        let contributions = Arc::new(self.aggregate_round(request, chain, applications).await?);
        self.round_cache.set(
            key,
            RoundContributions {
                passport_enabled: request.passport_enabled,
                contributions: contributions.clone(),
            },
        );
        Ok(contributions)
    }

    fn cached(&self, key: &RoundKey, passport_enabled: bool) -> Option<Arc<AggregatedContributions>> {
        match self.round_cache.get(key) {
            Some(hit) if hit.passport_enabled == passport_enabled => {
                debug!(round = %key, "calculator: round cache hit");
                Some(hit.contributions)
            }
            Some(_) => {
                debug!(round = %key, "calculator: round cache entry has other passport setting");
                None
            }
            None => {
                debug!(round = %key, "calculator: round cache miss");
                None
            }
        }
    }

    /// Load, weigh, cap and sum the round's votes on the blocking pool. File
    /// reads and JSON parsing stay off the async workers while the caller
    /// holds the round's in-flight marker.
    async fn aggregate_round(
        &self,
        request: &CalculationRequest,
        chain: &ChainConfig,
        applications: &BTreeMap<String, Application>,
    ) -> Result<AggregatedContributions, CalculatorError> {
        let inputs = RoundInputs {
            data: self.data.clone(),
            passport: self.passport_source(request)?,
            proportional_match: self.config.proportional_match,
            chain: chain.clone(),
            applications: applications.clone(),
            chain_id: request.chain_id,
            round_id: request.round_id.clone(),
            overrides: request.overrides.clone(),
        };
        tokio::task::spawn_blocking(move || inputs.aggregate())
            .await
            .map_err(|e| CalculatorError::AggregationTask(e.to_string()))?
    }

    fn allocation_options(
        &self,
        request: &CalculationRequest,
        token: &TokenConfig,
    ) -> Result<AllocationOptions, CalculatorError> {
        let min_contribution = fiat_to_token(
            request.min_contribution_usd,
            request.round_token_price_usd,
            token.decimals,
            USD_PRICE_DECIMALS,
        )?;
        let matching_cap_amount =
            matching_cap_amount(&request.match_pool, request.matching_cap_percentage)?;

        Ok(AllocationOptions {
            min_contribution,
            matching_cap_amount,
            ignore_saturation: self.config.ignore_saturation,
        })
    }
}

/// Owned inputs for one round aggregation.
struct RoundInputs {
    data: Arc<dyn DataProvider>,
    passport: Option<Arc<dyn ReputationProvider>>,
    proportional_match: ProportionalMatchOptions,
    chain: ChainConfig,
    applications: BTreeMap<String, Application>,
    chain_id: ChainId,
    round_id: String,
    overrides: Option<Bytes>,
}

impl RoundInputs {
    fn aggregate(self) -> Result<AggregatedContributions, CalculatorError> {
        let votes: Vec<Vote> = load_file(
            self.data.as_ref(),
            "votes",
            &votes_path(self.chain_id, &self.round_id),
        )?;

        let overrides = self
            .overrides
            .as_deref()
            .map(parse_coefficient_overrides)
            .transpose()?;

        let ctx = VoteContext {
            chain: &self.chain,
            proportional_match: &self.proportional_match,
            passport: self.passport.as_deref(),
            overrides: overrides.as_ref(),
        };
        let weighted = votes_with_coefficients(&ctx, votes, &self.applications)?;
        Ok(aggregate(&weighted))
    }
}

/// `pool * pct / 100` with the percentage truncated to four decimals.
pub fn matching_cap_amount(
    match_pool: &BigUint,
    percentage: Option<f64>,
) -> Result<Option<BigUint>, CalculatorError> {
    let Some(pct) = percentage else {
        return Ok(None);
    };
    if !(0.0..=100.0).contains(&pct) {
        return Err(CalculatorError::InvalidRequest(format!(
            "matching cap percentage out of range [0, 100]: {pct}"
        )));
    }
    let fixed = to_fixed(pct, CAP_PERCENT_DECIMALS)?;
    Ok(Some(match_pool * fixed / CAP_PERCENT_SCALE))
}

fn merge_result(
    application_id: String,
    m: ProjectMatch,
    applications: &BTreeMap<String, Application>,
    token: &TokenConfig,
    price: f64,
) -> Result<MatchResult, CalculatorError> {
    let matched_usd = token_to_fiat(&m.matched, token.decimals, price, USD_PRICE_DECIMALS)?;
    let (project_id, project_name, payout_address) = match applications.get(&application_id) {
        Some(app) => (
            app.project_id.clone(),
            app.project_name.clone(),
            app.payout_address.clone(),
        ),
        None => {
            warn!(%application_id, "calculator: match for application without metadata");
            Default::default()
        }
    };

    Ok(MatchResult {
        application_id,
        project_id,
        project_name,
        payout_address,
        total_received: m.total_received,
        contributions_count: m.contributions_count,
        matched_without_cap: m.matched_without_cap,
        cap_overflow: m.cap_overflow,
        matched: m.matched,
        matched_usd,
    })
}
