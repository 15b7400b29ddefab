//! Scenario: Run Artifacts On Disk
//!
//! # Invariants under test
//! 1. A backtest writes every artifact under `<out>/<run_id>/`.
//! 2. CSV tables carry their header even when empty.
//! 3. Money columns are six-decimal fixed strings.
//! 4. The manifest echoes the config hash, parameters and exclusions.

use chrono::NaiveDate;
use uuid::Uuid;

use dcd_artifacts::{
    write_run_artifacts, write_sweep_artifacts, BacktestRun, RunParameters, SweepRun,
};
use dcd_backtest::{
    calculate_returns, combine_by_ticker, compute_metrics, sweep, AllocationEngine,
    SimulationConfig, SimulationInput, SweepGrid,
};
use dcd_md::{ExclusionReason, Excluded, TickerSeries};
use dcd_portfolio::Micros;

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

/// KO at 100 through day 10, 110 after; ex-div day 10, earnings day 20.
fn input() -> SimulationInput {
    let mut input = SimulationInput::default();
    let mut ko = TickerSeries::default();
    for n in 1..=25 {
        ko.prices
            .insert(day(n), Micros::from_units(if n <= 10 { 100 } else { 110 }));
        input.top_stocks.insert(day(n), vec!["KO".to_string()]);
    }
    ko.dividends.insert(day(10));
    ko.earnings.insert(day(20));
    input.series.insert("KO".to_string(), ko);
    input
}

fn params() -> RunParameters {
    RunParameters {
        days_after_dividend: 0,
        days_before_earnings: 5,
        initial_capital: Micros::from_units(1_000).to_string(),
        num_pools: 1,
        top_n: 1,
        num_stocks: 1,
        start_date: day(1),
        end_date: day(25),
        data_source: "csv".to_string(),
    }
}

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn backtest_artifacts_are_complete_and_fixed_point() {
    let dir = tempfile::tempdir().unwrap();
    let input = input();
    let config = SimulationConfig::new(0, 5, Micros::from_units(1_000), 1);
    let report = AllocationEngine::new(config).run(&input).unwrap();
    let combined = combine_by_ticker(&report.snapshots);
    let metrics = compute_metrics(&report.snapshots, day(1), day(25), Micros::from_units(1_000));
    let baseline = calculate_returns(&input.series, day(1), day(25), &input.top_stocks, 1);
    let tickers = vec!["KO".to_string()];
    let excluded = vec![Excluded {
        ticker: "ZZZ".to_string(),
        reason: ExclusionReason::NoPrices,
    }];
    let run_id = Uuid::new_v4();

    let written = write_run_artifacts(
        dir.path(),
        &BacktestRun {
            run_id,
            config_hash: "abc123",
            parameters: params(),
            tickers: &tickers,
            excluded: &excluded,
            report: &report,
            combined: &combined,
            metrics: &metrics,
            baseline: &baseline,
        },
    )
    .unwrap();

    assert_eq!(written.run_dir, dir.path().join(run_id.to_string()));
    for f in [
        "manifest.json",
        "snapshots.csv",
        "combined.csv",
        "free_capital_errors.csv",
        "metrics.json",
        "baseline.json",
    ] {
        assert!(written.run_dir.join(f).is_file(), "missing {f}");
    }

    // Days 11..=15 add a position row next to the pool's free capital row.
    let snapshots = read(&written.run_dir.join("snapshots.csv"));
    let lines: Vec<&str> = snapshots.lines().collect();
    assert_eq!(lines[0], "date,pool,kind,ticker,value");
    assert_eq!(lines.len(), 1 + 25 + 5);
    assert!(lines.contains(&"2024-01-11,0,position,KO,1100.000000"));
    assert!(lines.contains(&"2024-01-11,0,free_capital,,0.000000"));

    let combined_csv = read(&written.run_dir.join("combined.csv"));
    let lines: Vec<&str> = combined_csv.lines().collect();
    assert_eq!(lines[0], "date,Free Capital,KO");
    assert_eq!(lines[1], "2024-01-01,1000.000000,0.000000");
    assert!(lines.contains(&"2024-01-11,0.000000,1100.000000"));

    assert_eq!(
        read(&written.run_dir.join("free_capital_errors.csv")),
        "ticker,date\n"
    );

    let manifest: serde_json::Value = serde_json::from_str(&read(&written.manifest_path)).unwrap();
    assert_eq!(manifest["run_id"], run_id.to_string());
    assert_eq!(manifest["kind"], "backtest");
    assert_eq!(manifest["config_hash"], "abc123");
    assert_eq!(manifest["parameters"]["initial_capital"], "1000.000000");
    assert_eq!(manifest["parameters"]["start_date"], "2024-01-01");
    assert_eq!(manifest["excluded"][0]["ticker"], "ZZZ");
    assert_eq!(manifest["excluded"][0]["reason"], "no_prices");
    assert_eq!(manifest["artifacts"].as_array().unwrap().len(), 6);

    let metrics_json: serde_json::Value =
        serde_json::from_str(&read(&written.run_dir.join("metrics.json"))).unwrap();
    assert_eq!(metrics_json["final_value"], 1100.0);
    assert_eq!(metrics_json["free_capital_errors"], 0);

    let baseline_json: serde_json::Value =
        serde_json::from_str(&read(&written.run_dir.join("baseline.json"))).unwrap();
    assert_eq!(baseline_json["per_ticker"][0]["start_price"], "100.000000");
    assert_eq!(baseline_json["per_ticker"][0]["end_price"], "110.000000");
}

#[test]
fn sweep_artifacts_list_one_row_per_grid_point() {
    let dir = tempfile::tempdir().unwrap();
    let input = input();
    let base = SimulationConfig::new(0, 0, Micros::from_units(1_000), 1);
    let grid = SweepGrid {
        days_after_dividend: vec![0, 1],
        days_before_earnings: vec![0, 5, 9],
    };
    let points = sweep(&input, &base, &grid, day(1), day(25)).unwrap();
    let tickers = vec!["KO".to_string()];

    let written = write_sweep_artifacts(
        dir.path(),
        &SweepRun {
            run_id: Uuid::new_v4(),
            config_hash: "abc123",
            parameters: params(),
            tickers: &tickers,
            excluded: &[],
            points: &points,
        },
    )
    .unwrap();

    let csv = read(&written.run_dir.join("sweep.csv"));
    let lines: Vec<&str> = csv.lines().collect();
    assert!(lines[0].starts_with("days_after_dividend,days_before_earnings,"));
    assert_eq!(lines.len(), 1 + 6);
    assert!(lines[1].starts_with("0,0,"));
    assert!(lines[6].starts_with("1,9,"));

    let manifest: serde_json::Value = serde_json::from_str(&read(&written.manifest_path)).unwrap();
    assert_eq!(manifest["kind"], "sweep");
    assert_eq!(manifest["artifacts"], serde_json::json!(["manifest.json", "sweep.csv"]));
}
