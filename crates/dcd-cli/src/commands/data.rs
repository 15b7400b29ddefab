//! Data inspection and download: `dcd rank`, `dcd coverage`, `dcd fetch`.

use anyhow::{Context, Result};
use std::path::Path;

use dcd_config::{ConfigMode, UnusedKeyPolicy};
use dcd_md::{coverage_report, fetch_all, write_csv_dir, FetchSeriesRequest};

use super::{eodhd_provider, load_bundles, load_config, prepare_universe};

/// Execute `dcd rank`: one `date,rank,ticker` line per ranked slot.
pub async fn rank(paths: &[String], policy: UnusedKeyPolicy) -> Result<()> {
    let loaded = load_config(paths, ConfigMode::Rank, policy)?;
    let cfg = &loaded.strategy;
    let universe = prepare_universe(cfg, load_bundles(cfg).await?);

    println!("date,rank,ticker");
    for (date, tickers) in &universe.input.top_stocks {
        for (i, t) in tickers.iter().enumerate() {
            println!("{date},{},{t}", i + 1);
        }
    }
    Ok(())
}

/// Execute `dcd coverage`. Reads raw bundles, before any exclusion.
pub async fn coverage(paths: &[String]) -> Result<()> {
    let loaded = load_config(paths, ConfigMode::Rank, UnusedKeyPolicy::Warn)?;
    let bundles = load_bundles(&loaded.strategy).await?;

    for c in coverage_report(&bundles) {
        println!(
            "ticker={} prices={} dividends={} earnings={} market_caps={} price_status={:?}",
            c.ticker, c.prices, c.dividends, c.earnings, c.market_caps, c.price_status
        );
    }
    Ok(())
}

/// Execute `dcd fetch`: EODHD into a CSV data directory for offline runs.
pub async fn fetch(paths: &[String], out_dir: &Path) -> Result<()> {
    let loaded = load_config(paths, ConfigMode::Fetch, UnusedKeyPolicy::Warn)?;
    let cfg = &loaded.strategy;
    let provider = eodhd_provider(cfg)?;

    let req = FetchSeriesRequest {
        tickers: cfg.tickers.clone(),
        start: cfg.start_date,
        end: cfg.end_date,
    };
    let bundles = fetch_all(&provider, &req).await;
    write_csv_dir(out_dir, &bundles)
        .with_context(|| format!("write data dir failed: {}", out_dir.display()))?;

    for b in bundles.values() {
        println!(
            "ticker={} prices={} dividends={} earnings={} market_caps={}",
            b.ticker,
            b.series.prices.len(),
            b.series.dividends.len(),
            b.series.earnings.len(),
            b.market_caps.len()
        );
    }
    println!("data_dir={}", out_dir.display());
    Ok(())
}
