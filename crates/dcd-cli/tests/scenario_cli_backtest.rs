//! Scenario: CLI Backtest Journey
//!
//! # Invariants under test
//! 1. `dcd backtest` on a CSV data dir prints a `key=value` summary and writes
//!    one run directory with a manifest.
//! 2. Tickers without prices are excluded before the run and reported.
//! 3. `--unused-keys fail` aborts on keys the command does not read.
//! 4. `dcd sweep` requires a sweep grid; with one it prints a line per point.
//! 5. `dcd rank` and `dcd config-hash` print machine-readable output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// KO: 100 through Jan 10, 110 afterwards; ex-div Jan 10, earnings Jan 20.
/// BAD: market cap only, so it is ranked data but never priced.
fn write_data_dir(root: &Path) -> PathBuf {
    let dir = root.join("data");
    fs::create_dir_all(&dir).unwrap();

    let mut prices = String::from("ticker,date,adjusted_close\n");
    for d in 1..=25 {
        let px = if d <= 10 { "100" } else { "110.00" };
        prices.push_str(&format!("KO,2024-01-{d:02},{px}\n"));
    }
    fs::write(dir.join("prices.csv"), prices).unwrap();
    fs::write(dir.join("dividends.csv"), "ticker,date\nKO,2024-01-10\n").unwrap();
    fs::write(dir.join("earnings.csv"), "ticker,report_date\nKO,2024-01-20\n").unwrap();
    fs::write(
        dir.join("market_caps.csv"),
        "ticker,date,value\nKO,2024-01-01,250000000000\nBAD,2024-01-01,900000000000\n",
    )
    .unwrap();
    dir
}

fn write_config(root: &Path, data_dir: &Path, extra: &str) -> PathBuf {
    let path = root.join("config.yaml");
    let yaml = format!(
        r#"
strategy:
  days_after_dividend: 0
  days_before_earnings: 5
  initial_capital: 1000
  num_pools: 1
universe:
  top_n: 1
  start_date: "2024-01-01"
  end_date: "2024-01-25"
data:
  source: csv
  dir: "{}"
{extra}
"#,
        data_dir.display()
    );
    fs::write(&path, yaml).unwrap();
    path
}

fn dcd() -> Command {
    Command::cargo_bin("dcd").unwrap()
}

#[test]
fn backtest_prints_summary_and_writes_run_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(tmp.path(), &data, "");
    let out = tmp.path().join("exports");

    dcd()
        .args(["backtest", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("tickers=KO\n"))
        .stdout(predicate::str::contains("excluded=BAD reason=NoPrices"))
        .stdout(predicate::str::contains("days=25"))
        .stdout(predicate::str::contains("free_capital_errors=0"))
        .stdout(predicate::str::contains("final_value=1100.00"))
        .stdout(predicate::str::contains("overall_return_pct=10.00"));

    let runs: Vec<_> = fs::read_dir(&out).unwrap().collect();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].as_ref().unwrap().path();
    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["kind"], "backtest");
    assert_eq!(manifest["parameters"]["num_pools"], 1);
    assert_eq!(manifest["tickers"], serde_json::json!(["KO"]));
    assert!(run_dir.join("snapshots.csv").is_file());
}

#[test]
fn unused_keys_fail_policy_aborts() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(tmp.path(), &data, "charting:\n  theme: dark\n");

    dcd()
        .args(["backtest", "--unused-keys", "fail", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(tmp.path().join("exports"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"))
        .stderr(predicate::str::contains("/charting/theme"));
}

#[test]
fn sweep_requires_grid() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(tmp.path(), &data, "");

    dcd()
        .args(["sweep", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(tmp.path().join("exports"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_MISSING /sweep"));
}

#[test]
fn sweep_prints_one_line_per_point() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(
        tmp.path(),
        &data,
        "sweep:\n  days_after_dividend: [0, 1]\n  days_before_earnings: [5]\n",
    );

    dcd()
        .args(["sweep", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(tmp.path().join("exports"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "days_after_dividend=0 days_before_earnings=5 overall_return_pct=10.00",
        ))
        .stdout(predicate::str::contains(
            "days_after_dividend=1 days_before_earnings=5 overall_return_pct=0.00",
        ));
}

#[test]
fn rank_lists_priced_tickers_only() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(tmp.path(), &data, "");

    dcd()
        .args(["rank", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("date,rank,ticker\n"))
        .stdout(predicate::str::contains("2024-01-01,1,KO\n"))
        .stdout(predicate::str::contains("2024-01-25,1,KO\n"))
        .stdout(predicate::str::contains("BAD").not());
}

#[test]
fn config_hash_is_printed() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(tmp.path(), &data, "");

    dcd()
        .arg("config-hash")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::is_match("^config_hash=[0-9a-f]{64}\n").unwrap());
}

#[test]
fn literal_secret_in_config_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let data = write_data_dir(tmp.path());
    let config = write_config(
        tmp.path(),
        &data,
        "extra:\n  token: \"sk-live-abcdefghijkl\"\n",
    );

    dcd()
        .arg("config-hash")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("abcdefghijkl").not());
}
