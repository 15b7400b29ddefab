//! `dcd backtest` and `dcd sweep`.

use anyhow::{bail, Context, Result};
use std::path::Path;
use uuid::Uuid;

use dcd_artifacts::{write_run_artifacts, write_sweep_artifacts, BacktestRun, RunParameters, SweepRun};
use dcd_backtest::{
    calculate_returns, combine_by_ticker, compute_metrics, sweep, AllocationEngine,
    SimulationConfig, SweepGrid, TracingObserver,
};
use dcd_config::{ConfigMode, StrategyConfig, UnusedKeyPolicy};
use dcd_portfolio::Micros;

use super::{data_source_name, load_bundles, load_config, prepare_universe};

fn simulation_config(cfg: &StrategyConfig) -> Result<SimulationConfig> {
    let capital = Micros::from_f64(cfg.initial_capital).with_context(|| {
        format!(
            "CONFIG_INVALID /strategy/initial_capital: {} not representable",
            cfg.initial_capital
        )
    })?;
    Ok(SimulationConfig::new(
        cfg.days_after_dividend,
        cfg.days_before_earnings,
        capital,
        cfg.num_pools,
    ))
}

fn run_parameters(cfg: &StrategyConfig, sim: &SimulationConfig) -> RunParameters {
    RunParameters {
        days_after_dividend: sim.days_after_dividend,
        days_before_earnings: sim.days_before_earnings,
        initial_capital: sim.initial_capital.to_string(),
        num_pools: sim.num_pools,
        top_n: cfg.top_n,
        num_stocks: cfg.num_stocks,
        start_date: cfg.start_date,
        end_date: cfg.end_date,
        data_source: data_source_name(cfg).to_string(),
    }
}

/// Execute `dcd backtest`.
pub async fn run_backtest(paths: &[String], out: &Path, policy: UnusedKeyPolicy) -> Result<()> {
    let loaded = load_config(paths, ConfigMode::Backtest, policy)?;
    let cfg = &loaded.strategy;
    let sim_cfg = simulation_config(cfg)?;

    let universe = prepare_universe(cfg, load_bundles(cfg).await?);

    let report = AllocationEngine::new(sim_cfg.clone())
        .run_with_observer(&universe.input, &mut TracingObserver)?;
    let metrics = compute_metrics(
        &report.snapshots,
        cfg.start_date,
        cfg.end_date,
        sim_cfg.initial_capital,
    );
    let baseline = calculate_returns(
        &universe.input.series,
        cfg.start_date,
        cfg.end_date,
        &universe.input.top_stocks,
        cfg.num_stocks,
    );
    let combined = combine_by_ticker(&report.snapshots);

    let run_id = Uuid::new_v4();
    let written = write_run_artifacts(
        out,
        &BacktestRun {
            run_id,
            config_hash: &loaded.raw.config_hash,
            parameters: run_parameters(cfg, &sim_cfg),
            tickers: &universe.tickers,
            excluded: &universe.excluded,
            report: &report,
            combined: &combined,
            metrics: &metrics,
            baseline: &baseline,
        },
    )?;

    println!("run_id={run_id}");
    println!("config_hash={}", loaded.raw.config_hash);
    println!("tickers={}", universe.tickers.join(","));
    for e in &universe.excluded {
        println!("excluded={} reason={:?}", e.ticker, e.reason);
    }
    println!("days={}", report.snapshots.len());
    println!("free_capital_errors={}", report.free_capital_errors.len());
    println!("final_value={:.2}", metrics.final_value);
    println!("percent_time_in_market={:.2}", metrics.percent_time_in_market);
    println!("overall_return_pct={:.2}", metrics.overall_return_pct);
    println!("annualized_return_pct={:.2}", metrics.annualized_return_pct);
    match baseline.avg_percent_return {
        Some(v) => println!("baseline_avg_return_pct={v:.2}"),
        None => println!("baseline_avg_return_pct="),
    }
    match baseline.avg_annual_return {
        Some(v) => println!("baseline_avg_annual_return_pct={v:.2}"),
        None => println!("baseline_avg_annual_return_pct="),
    }
    println!("artifacts={}", written.run_dir.display());
    Ok(())
}

/// Execute `dcd sweep`.
pub async fn run_sweep(paths: &[String], out: &Path, policy: UnusedKeyPolicy) -> Result<()> {
    let loaded = load_config(paths, ConfigMode::Sweep, policy)?;
    let cfg = &loaded.strategy;
    if cfg.sweep.is_empty() {
        bail!("CONFIG_MISSING /sweep: need non-empty days_after_dividend and days_before_earnings");
    }
    let base = simulation_config(cfg)?;
    let grid = SweepGrid {
        days_after_dividend: cfg.sweep.days_after_dividend.clone(),
        days_before_earnings: cfg.sweep.days_before_earnings.clone(),
    };

    let universe = prepare_universe(cfg, load_bundles(cfg).await?);
    let points = sweep(&universe.input, &base, &grid, cfg.start_date, cfg.end_date)?;

    let run_id = Uuid::new_v4();
    let written = write_sweep_artifacts(
        out,
        &SweepRun {
            run_id,
            config_hash: &loaded.raw.config_hash,
            parameters: run_parameters(cfg, &base),
            tickers: &universe.tickers,
            excluded: &universe.excluded,
            points: &points,
        },
    )?;

    println!("run_id={run_id}");
    println!("config_hash={}", loaded.raw.config_hash);
    for p in &points {
        println!(
            "days_after_dividend={} days_before_earnings={} overall_return_pct={:.2} \
             percent_time_in_market={:.2} free_capital_errors={}",
            p.days_after_dividend,
            p.days_before_earnings,
            p.metrics.overall_return_pct,
            p.metrics.percent_time_in_market,
            p.free_capital_errors
        );
    }
    println!("artifacts={}", written.run_dir.display());
    Ok(())
}
