//! Command handler modules for dcd-cli.
//!
//! Shared config and data loading lives here.
//! Command-specific logic lives in the submodules.

pub mod backtest;
pub mod data;

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

use dcd_backtest::SimulationInput;
use dcd_config::{
    report_unused_keys, resolve_api_key, ConfigMode, DataSource, LoadedConfig, StrategyConfig,
    UnusedKeyPolicy,
};
use dcd_md::{
    exclude_unpriced, exclude_without_dividends, fetch_all, load_csv_dir, market_caps_for_ranking,
    rank_top_n, series_map, EodhdProvider, Excluded, FetchSeriesRequest, ResponseCache,
    TickerBundle,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

pub struct Loaded {
    pub raw: LoadedConfig,
    pub strategy: StrategyConfig,
}

/// Load layered config, report unused keys for `mode`, extract and validate.
pub fn load_config(paths: &[String], mode: ConfigMode, policy: UnusedKeyPolicy) -> Result<Loaded> {
    let raw = dcd_config::load_layered_yaml(paths)?;
    let report = report_unused_keys(mode, &raw.config_json, policy)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(mode = %report.mode, pointer = %ptr, "config key not read by this command");
    }
    let strategy = StrategyConfig::from_config_json(&raw.config_json)?;
    info!(config_hash = %raw.config_hash, mode = mode.as_str(), "config loaded");
    Ok(Loaded { raw, strategy })
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

/// Build the EODHD provider described by `cfg`, or fail if the source is csv.
pub fn eodhd_provider(cfg: &StrategyConfig) -> Result<EodhdProvider> {
    let DataSource::Eodhd {
        api_key_env,
        cache_dir,
    } = &cfg.data
    else {
        bail!("CONFIG_INVALID /data/source: this command needs source: eodhd");
    };
    let key = resolve_api_key(api_key_env)?;
    let mut provider = EodhdProvider::new(key.expose().to_string())
        .with_market_cap_aliases(cfg.market_cap_aliases.clone());
    if let Some(dir) = cache_dir {
        provider = provider.with_cache(ResponseCache::new(dir.clone()));
    }
    Ok(provider)
}

/// Every configured ticker with its series and per-series fetch status.
pub async fn load_bundles(cfg: &StrategyConfig) -> Result<BTreeMap<String, TickerBundle>> {
    match &cfg.data {
        DataSource::Csv { dir } => load_csv_dir(dir, &cfg.tickers)
            .with_context(|| format!("load data dir failed: {}", dir.display())),
        DataSource::Eodhd { .. } => {
            let provider = eodhd_provider(cfg)?;
            let req = FetchSeriesRequest {
                tickers: cfg.tickers.clone(),
                start: cfg.start_date,
                end: cfg.end_date,
            };
            Ok(fetch_all(&provider, &req).await)
        }
    }
}

/// Simulation input after fail-fast exclusion and ranking.
pub struct Universe {
    pub input: SimulationInput,
    pub tickers: Vec<String>,
    pub excluded: Vec<Excluded>,
}

pub fn prepare_universe(
    cfg: &StrategyConfig,
    mut bundles: BTreeMap<String, TickerBundle>,
) -> Universe {
    let mut excluded = exclude_unpriced(&mut bundles);
    if cfg.require_dividends {
        excluded.extend(exclude_without_dividends(&mut bundles));
    }
    if bundles.is_empty() {
        warn!("no tickers left after exclusion");
    }

    let caps = market_caps_for_ranking(&bundles);
    let top_stocks = rank_top_n(&caps, cfg.start_date, cfg.end_date, cfg.top_n);
    info!(
        tickers = bundles.len(),
        excluded = excluded.len(),
        ranked_days = top_stocks.len(),
        "universe prepared"
    );

    Universe {
        tickers: bundles.keys().cloned().collect(),
        input: SimulationInput {
            series: series_map(&bundles),
            top_stocks,
        },
        excluded,
    }
}

pub fn data_source_name(cfg: &StrategyConfig) -> &'static str {
    match cfg.data {
        DataSource::Csv { .. } => "csv",
        DataSource::Eodhd { .. } => "eodhd",
    }
}
