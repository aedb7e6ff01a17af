//! qf-calc: quadratic-funding matching calculator.
//!
//! Loads a round from the data directory, runs the matching pipeline with the
//! linear QF backend, and prints the result as JSON on stdout. Logs go to
//! stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use num_bigint::BigUint;
use qf_calculator::{CalculationRequest, Calculator, CalculatorConfig};
use qf_core::types::PotentialVote;
use qf_linear::LinearQf;
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "qf-calc")]
#[command(version, about = "Quadratic-funding matching calculator")]
struct Cli {
    /// TOML config file. `QF_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding round files and passport scores.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json").
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute matched amounts for every approved application in a round.
    Calculate(RoundArgs),
    /// Show how potential votes would move each application's match.
    Estimate(EstimateArgs),
}

#[derive(Args)]
struct RoundArgs {
    /// Chain id the round lives on.
    #[arg(long)]
    chain_id: u64,

    /// Round id (usually the round contract address).
    #[arg(long)]
    round_id: String,

    /// Matching pool in round-token base units.
    #[arg(long, value_parser = parse_amount)]
    match_pool: BigUint,

    /// Minimum contribution in USD to be matched.
    #[arg(long, default_value_t = 0.0)]
    min_contribution_usd: f64,

    /// Per-application match ceiling as a percentage of the pool.
    #[arg(long)]
    matching_cap_percentage: Option<f64>,

    /// Weight votes by the voters' passport scores.
    #[arg(long)]
    passport: bool,

    /// CSV file with `id,coefficient` overrides.
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Round matching token address.
    #[arg(long)]
    round_token: String,

    /// Round token price in USD.
    #[arg(long)]
    price: f64,
}

#[derive(Args)]
struct EstimateArgs {
    #[command(flatten)]
    round: RoundArgs,

    /// JSON array of `{voter, applicationId, amountUSD}`.
    #[arg(long)]
    potential_votes: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_logging(&config.log_level, &cli.log_format);
    info!("qf-calc v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);

    let calculator = Calculator::from_config(config, Arc::new(LinearQf::new()))
        .context("Failed to start calculator")?;

    let outcome = match cli.command {
        Commands::Calculate(args) => calculate(&calculator, args).await,
        Commands::Estimate(args) => estimate(&calculator, args).await,
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    calculator.shutdown();
    outcome
}

/// Config file and environment first, then command-line flags.
fn load_config(cli: &Cli) -> Result<CalculatorConfig> {
    let mut config = CalculatorConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

async fn calculate(calculator: &Calculator, args: RoundArgs) -> Result<()> {
    let request = build_request(args)?;
    let results = calculator
        .calculate(&request)
        .await
        .with_context(|| format!("Calculation failed for round {}", request.round_key()))?;
    print_json(&results)
}

async fn estimate(calculator: &Calculator, args: EstimateArgs) -> Result<()> {
    let potential: Vec<PotentialVote> = read_json(&args.potential_votes)?;
    let request = build_request(args.round)?;
    let estimates = calculator
        .estimate_matching(&request, &potential)
        .await
        .with_context(|| format!("Estimate failed for round {}", request.round_key()))?;
    print_json(&estimates)
}

fn build_request(args: RoundArgs) -> Result<CalculationRequest> {
    let overrides = match &args.overrides {
        Some(path) => Some(Bytes::from(
            std::fs::read(path)
                .with_context(|| format!("Failed to read overrides: {}", path.display()))?,
        )),
        None => None,
    };

    Ok(CalculationRequest {
        chain_id: args.chain_id,
        round_id: args.round_id,
        match_pool: args.match_pool,
        min_contribution_usd: args.min_contribution_usd,
        matching_cap_percentage: args.matching_cap_percentage,
        passport_enabled: args.passport,
        overrides,
        round_token: args.round_token,
        round_token_price_usd: args.price,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn parse_amount(s: &str) -> std::result::Result<BigUint, String> {
    s.parse::<BigUint>()
        .map_err(|e| format!("invalid amount {s:?}: {e}"))
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Output goes to stderr so stdout carries only the JSON result.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
