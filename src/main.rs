// src/main.rs
//
// Re-export market finder CLI.
// Expands from a seed market over Comtrade import flows, year by year, and
// reports the markets that recur often enough.

use anyhow::{Context, Result};
use clap::Parser;
use market_finder::catalog::{CodeDirectory, ProductionTable};
use market_finder::config::{default_config_template, parse_commodities, parse_years, Config};
use market_finder::connectors::{ComtradeClient, RecordingSource, ReplaySource, RetryingSource};
use market_finder::finder::{MarketExpander, MarketFinder};
use market_finder::models::Year;
use market_finder::report;
use market_finder::traits::SharedTradeFlowSource;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "market-finder")]
#[command(about = "Discovers re-export markets for a commodity from Comtrade trade flows")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short)]
    config: Option<String>,

    /// Generate a default configuration file
    #[arg(long)]
    generate_config: bool,

    /// Market to start the expansion from (overrides config)
    #[arg(long)]
    seed: Option<String>,

    /// Run a single year instead of the multi-year analysis
    #[arg(long, conflicts_with = "years")]
    year: Option<Year>,

    /// Years to analyse, e.g. "2003-2013" or "2003,2005" (overrides config)
    #[arg(long)]
    years: Option<String>,

    /// Import share of reference production a partner must exceed
    #[arg(long)]
    t_market: Option<f64>,

    /// Fraction of years a market must recur in to be kept
    #[arg(long)]
    t_year: Option<f64>,

    /// Comma-separated HS commodity codes (overrides config)
    #[arg(long)]
    commodities: Option<String>,

    /// Serve trade flows from a recorded JSONL file instead of Comtrade
    #[arg(long)]
    replay: Option<String>,

    /// Record every fetched trade flow to a JSONL file
    #[arg(long, conflicts_with = "replay")]
    record: Option<String>,

    /// Output machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_config {
        println!("{}", default_config_template());
        return;
    }

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).map_err(anyhow::Error::msg)?,
        None => Config::default(),
    };

    init_logging(config.global.log_level.as_deref());
    apply_overrides(&mut config, &args)?;

    let directory = Arc::new(
        CodeDirectory::from_file(&config.data.codes_path).context("Failed to load country codes")?,
    );
    let production = Arc::new(
        ProductionTable::from_file(&config.data.production_path)
            .context("Failed to load production data")?,
    );
    let source = build_source(&config, &args)?;

    let expander = MarketExpander::new(directory, production, source, config.finder.clone())?;
    let finder = MarketFinder::new(expander);

    if let Some(year) = args.year {
        let result = finder.find_markets(Some(year), None).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{}", report::format_yearly(&result));
        }
        return Ok(());
    }

    let report = finder.multi_year_markets(None, None, None).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::format_multi_year(&report));
    }

    let unconverged = report.unconverged_years();
    if !unconverged.is_empty() {
        log::warn!("Round cap reached in {:?}; those market sets are partial", unconverged);
    }
    Ok(())
}

/// RUST_LOG wins; otherwise the configured level, otherwise info.
fn init_logging(level: Option<&str>) {
    let default_level = level.unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    let finder = &mut config.finder;
    if let Some(seed) = &args.seed {
        finder.seed_market = seed.clone();
    }
    if let Some(years) = &args.years {
        finder.years = parse_years(years).map_err(anyhow::Error::msg)?;
    }
    if let Some(year) = args.year {
        finder.year = year;
    }
    if let Some(t) = args.t_market {
        finder.t_market = t;
    }
    if let Some(t) = args.t_year {
        finder.t_year = t;
    }
    if let Some(codes) = &args.commodities {
        finder.commodity_codes = parse_commodities(codes).map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

fn build_source(config: &Config, args: &Args) -> Result<SharedTradeFlowSource> {
    if let Some(path) = &args.replay {
        let replay = ReplaySource::from_jsonl(path)
            .with_context(|| format!("Failed to open recorded flows {}", path))?;
        return Ok(Arc::new(replay));
    }

    let client = ComtradeClient::new(
        &config.comtrade.base_url,
        config.comtrade.max_records,
        config.comtrade.request_timeout(),
    )
    .map_err(anyhow::Error::msg)?;
    let retrying = RetryingSource::with_schedule(client, config.comtrade.backoff_schedule());

    match &args.record {
        Some(path) => {
            let recording = RecordingSource::new(retrying, path)
                .with_context(|| format!("Failed to create recording {}", path))?;
            log::info!("Recording fetched flows to {}", path);
            Ok(Arc::new(recording))
        }
        None => Ok(Arc::new(retrying)),
    }
}
