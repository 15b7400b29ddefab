//! dcd-artifacts
//!
//! Writes one run's outputs under `<out>/<run_id>/`.
//! Money is written as fixed six-decimal strings so files diff cleanly
//! between replays.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use dcd_backtest::{
    BaselineReturns, CombinedSeries, EntryKind, SimulationReport, StrategyMetrics, SweepPoint,
};
use dcd_md::Excluded;
use dcd_portfolio::Micros;

pub const SCHEMA_VERSION: i32 = 1;

pub const MANIFEST_JSON: &str = "manifest.json";
pub const SNAPSHOTS_CSV: &str = "snapshots.csv";
pub const COMBINED_CSV: &str = "combined.csv";
pub const FREE_CAPITAL_ERRORS_CSV: &str = "free_capital_errors.csv";
pub const METRICS_JSON: &str = "metrics.json";
pub const BASELINE_JSON: &str = "baseline.json";
pub const SWEEP_CSV: &str = "sweep.csv";

/// Knobs that shaped the run, echoed into the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParameters {
    pub days_after_dividend: u32,
    pub days_before_earnings: u32,
    pub initial_capital: String,
    pub num_pools: usize,
    pub top_n: usize,
    pub num_stocks: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub kind: String,
    pub config_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub parameters: RunParameters,
    pub tickers: Vec<String>,
    pub excluded: Vec<Excluded>,
    pub artifacts: Vec<String>,
}

pub struct BacktestRun<'a> {
    pub run_id: Uuid,
    pub config_hash: &'a str,
    pub parameters: RunParameters,
    pub tickers: &'a [String],
    pub excluded: &'a [Excluded],
    pub report: &'a SimulationReport,
    pub combined: &'a CombinedSeries,
    pub metrics: &'a StrategyMetrics,
    pub baseline: &'a BaselineReturns,
}

pub struct SweepRun<'a> {
    pub run_id: Uuid,
    pub config_hash: &'a str,
    pub parameters: RunParameters,
    pub tickers: &'a [String],
    pub excluded: &'a [Excluded],
    pub points: &'a [SweepPoint],
}

#[derive(Debug, Clone)]
pub struct WrittenRun {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Serialized shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SnapshotRow<'a> {
    date: NaiveDate,
    pool: usize,
    kind: &'static str,
    ticker: &'a str,
    value: String,
}

#[derive(Serialize)]
struct FreeCapitalErrorRow<'a> {
    ticker: &'a str,
    date: NaiveDate,
}

#[derive(Serialize)]
struct MetricsDoc {
    invested_capital_days: f64,
    uninvested_capital_days: f64,
    total_capital_tracked: f64,
    percent_time_in_market: f64,
    final_value: f64,
    overall_return_pct: f64,
    annualized_return_pct: f64,
    free_capital_errors: usize,
}

#[derive(Serialize)]
struct TickerReturnDoc<'a> {
    ticker: &'a str,
    start_price: String,
    end_price: String,
    percent_return: f64,
    annual_return: Option<f64>,
}

#[derive(Serialize)]
struct BaselineDoc<'a> {
    first_valid_date: Option<NaiveDate>,
    last_valid_date: Option<NaiveDate>,
    avg_percent_return: Option<f64>,
    avg_annual_return: Option<f64>,
    per_ticker: Vec<TickerReturnDoc<'a>>,
}

#[derive(Serialize)]
struct SweepRow {
    days_after_dividend: u32,
    days_before_earnings: u32,
    percent_time_in_market: f64,
    overall_return_pct: f64,
    annualized_return_pct: f64,
    final_value: f64,
    free_capital_errors: usize,
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_run_artifacts(out_dir: &Path, run: &BacktestRun<'_>) -> Result<WrittenRun> {
    let run_dir = create_run_dir(out_dir, run.run_id)?;

    write_snapshots(&run_dir.join(SNAPSHOTS_CSV), run.report)?;
    write_combined(&run_dir.join(COMBINED_CSV), run.combined)?;
    write_free_capital_errors(&run_dir.join(FREE_CAPITAL_ERRORS_CSV), run.report)?;

    let m = run.metrics;
    write_json(
        &run_dir.join(METRICS_JSON),
        &MetricsDoc {
            invested_capital_days: m.invested_capital_days,
            uninvested_capital_days: m.uninvested_capital_days,
            total_capital_tracked: m.total_capital_tracked,
            percent_time_in_market: m.percent_time_in_market,
            final_value: m.final_value,
            overall_return_pct: m.overall_return_pct,
            annualized_return_pct: m.annualized_return_pct,
            free_capital_errors: run.report.free_capital_errors.len(),
        },
    )?;

    let b = run.baseline;
    write_json(
        &run_dir.join(BASELINE_JSON),
        &BaselineDoc {
            first_valid_date: b.first_valid_date,
            last_valid_date: b.last_valid_date,
            avg_percent_return: b.avg_percent_return,
            avg_annual_return: b.avg_annual_return,
            per_ticker: b
                .per_ticker
                .iter()
                .map(|r| TickerReturnDoc {
                    ticker: &r.ticker,
                    start_price: r.start_price.to_string(),
                    end_price: r.end_price.to_string(),
                    percent_return: r.percent_return,
                    annual_return: r.annual_return,
                })
                .collect(),
        },
    )?;

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: run.run_id,
        kind: "backtest".to_string(),
        config_hash: run.config_hash.to_string(),
        created_at_utc: Utc::now(),
        parameters: run.parameters.clone(),
        tickers: run.tickers.to_vec(),
        excluded: run.excluded.to_vec(),
        artifacts: [
            MANIFEST_JSON,
            SNAPSHOTS_CSV,
            COMBINED_CSV,
            FREE_CAPITAL_ERRORS_CSV,
            METRICS_JSON,
            BASELINE_JSON,
        ]
        .map(String::from)
        .to_vec(),
    };
    let manifest_path = run_dir.join(MANIFEST_JSON);
    write_json(&manifest_path, &manifest)?;

    Ok(WrittenRun {
        run_dir,
        manifest_path,
    })
}

pub fn write_sweep_artifacts(out_dir: &Path, run: &SweepRun<'_>) -> Result<WrittenRun> {
    let run_dir = create_run_dir(out_dir, run.run_id)?;

    let path = run_dir.join(SWEEP_CSV);
    let mut wtr = csv_writer(
        &path,
        &[
            "days_after_dividend",
            "days_before_earnings",
            "percent_time_in_market",
            "overall_return_pct",
            "annualized_return_pct",
            "final_value",
            "free_capital_errors",
        ],
    )?;
    for p in run.points {
        wtr.serialize(SweepRow {
            days_after_dividend: p.days_after_dividend,
            days_before_earnings: p.days_before_earnings,
            percent_time_in_market: p.metrics.percent_time_in_market,
            overall_return_pct: p.metrics.overall_return_pct,
            annualized_return_pct: p.metrics.annualized_return_pct,
            final_value: p.metrics.final_value,
            free_capital_errors: p.free_capital_errors,
        })
        .with_context(|| format!("write row failed: {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flush failed: {}", path.display()))?;

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: run.run_id,
        kind: "sweep".to_string(),
        config_hash: run.config_hash.to_string(),
        created_at_utc: Utc::now(),
        parameters: run.parameters.clone(),
        tickers: run.tickers.to_vec(),
        excluded: run.excluded.to_vec(),
        artifacts: vec![MANIFEST_JSON.to_string(), SWEEP_CSV.to_string()],
    };
    let manifest_path = run_dir.join(MANIFEST_JSON);
    write_json(&manifest_path, &manifest)?;

    Ok(WrittenRun {
        run_dir,
        manifest_path,
    })
}

fn create_run_dir(out_dir: &Path, run_id: Uuid) -> Result<PathBuf> {
    let run_dir = out_dir.join(run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create run dir failed: {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Header is written up front so empty tables still carry their columns.
fn csv_writer(path: &Path, header: &[&str]) -> Result<csv::Writer<fs::File>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create csv failed: {}", path.display()))?;
    wtr.write_record(header)
        .with_context(|| format!("write header failed: {}", path.display()))?;
    Ok(wtr)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json failed")?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("write failed: {}", path.display()))
}

fn write_snapshots(path: &Path, report: &SimulationReport) -> Result<()> {
    let mut wtr = csv_writer(path, &["date", "pool", "kind", "ticker", "value"])?;
    for snap in &report.snapshots {
        for e in &snap.entries {
            let (kind, ticker) = match &e.kind {
                EntryKind::FreeCapital => ("free_capital", ""),
                EntryKind::Position(t) => ("position", t.as_str()),
            };
            wtr.serialize(SnapshotRow {
                date: snap.date,
                pool: e.pool,
                kind,
                ticker,
                value: e.value.to_string(),
            })
            .with_context(|| format!("write row failed: {}", path.display()))?;
        }
    }
    wtr.flush()
        .with_context(|| format!("flush failed: {}", path.display()))
}

fn write_combined(path: &Path, combined: &CombinedSeries) -> Result<()> {
    let mut header = vec!["date"];
    header.extend(combined.columns());
    let mut wtr = csv_writer(path, &header)?;

    for row in &combined.rows {
        let mut rec = Vec::with_capacity(header.len());
        rec.push(row.date.to_string());
        rec.push(row.free_capital.to_string());
        rec.extend(row.holdings.iter().map(Micros::to_string));
        wtr.write_record(&rec)
            .with_context(|| format!("write row failed: {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flush failed: {}", path.display()))
}

fn write_free_capital_errors(path: &Path, report: &SimulationReport) -> Result<()> {
    let mut wtr = csv_writer(path, &["ticker", "date"])?;
    for e in &report.free_capital_errors {
        wtr.serialize(FreeCapitalErrorRow {
            ticker: &e.ticker,
            date: e.date,
        })
        .with_context(|| format!("write row failed: {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flush failed: {}", path.display()))
}
