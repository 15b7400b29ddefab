//! Scenario: Strategy Config Boundary Validation
//!
//! # Invariants under test
//! 1. Omitted knobs take their documented defaults.
//! 2. Missing dates and inverted windows are rejected before any run.
//! 3. Zero pools, non-positive capital and zero top_n are rejected.
//! 4. The eodhd source keeps the env var name, never a key.

use chrono::NaiveDate;
use dcd_config::{load_layered_yaml_from_strings, DataSource, StrategyConfig};

fn parse(yaml: &str) -> anyhow::Result<StrategyConfig> {
    let loaded = load_layered_yaml_from_strings(&[yaml])?;
    StrategyConfig::from_config_json(&loaded.config_json)
}

const MINIMAL: &str = r#"
universe:
  start_date: "2023-01-01"
  end_date: "2023-06-30"
"#;

#[test]
fn defaults_fill_omitted_knobs() {
    let cfg = parse(MINIMAL).unwrap();
    assert_eq!(cfg.days_after_dividend, 0);
    assert_eq!(cfg.days_before_earnings, 0);
    assert_eq!(cfg.initial_capital, 1000.0);
    assert_eq!(cfg.num_pools, 5);
    assert_eq!(cfg.top_n, 5);
    assert_eq!(cfg.num_stocks, 5);
    assert!(!cfg.require_dividends);
    assert!(cfg.sweep.is_empty());
    assert_eq!(
        cfg.data,
        DataSource::Csv {
            dir: "data".into()
        }
    );
    assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    assert_eq!(
        cfg.market_cap_aliases.get("NESN.SW").map(String::as_str),
        Some("NSRGY.US")
    );
}

#[test]
fn explicit_alias_map_replaces_default() {
    let cfg = parse(
        r#"
universe:
  start_date: "2023-01-01"
  end_date: "2023-02-01"
  market_cap_aliases: { ROG.SW: RHHBY.US }
"#,
    )
    .unwrap();
    assert_eq!(cfg.market_cap_aliases.len(), 1);
    assert_eq!(cfg.market_cap_aliases["ROG.SW"], "RHHBY.US");
}

#[test]
fn baseline_num_stocks_follows_top_n_unless_set() {
    let cfg = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01", top_n: 3 }
"#,
    )
    .unwrap();
    assert_eq!(cfg.num_stocks, 3);

    let cfg = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01", top_n: 3 }
baseline: { num_stocks: 10 }
"#,
    )
    .unwrap();
    assert_eq!(cfg.num_stocks, 10);
}

#[test]
fn tickers_accept_list_or_comma_string() {
    let a = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01", tickers: "AAPL, MSFT,KO" }
"#,
    )
    .unwrap();
    let b = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01", tickers: [AAPL, MSFT, KO] }
"#,
    )
    .unwrap();
    assert_eq!(a.tickers, vec!["AAPL", "MSFT", "KO"]);
    assert_eq!(a.tickers, b.tickers);
}

#[test]
fn missing_start_date_is_rejected() {
    let err = parse("universe: { end_date: \"2023-02-01\" }").unwrap_err();
    assert!(err.to_string().contains("CONFIG_MISSING /universe/start_date"));
}

#[test]
fn inverted_window_is_rejected() {
    let err = parse(
        r#"
universe: { start_date: "2023-03-01", end_date: "2023-02-01" }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("CONFIG_INVALID /universe"));
}

#[test]
fn zero_pools_and_bad_capital_are_rejected() {
    for body in [
        "strategy: { num_pools: 0 }",
        "strategy: { initial_capital: 0 }",
        "strategy: { initial_capital: -5 }",
        "universe: { top_n: 0 }",
        "strategy: { num_pools: -1 }",
    ] {
        let yaml = format!("{MINIMAL}\n{body}\n");
        // A second `universe:` key would replace the first, so merge as a layer.
        let loaded = load_layered_yaml_from_strings(&[MINIMAL, body]).unwrap();
        assert!(
            StrategyConfig::from_config_json(&loaded.config_json).is_err(),
            "expected rejection for {yaml}"
        );
    }
}

#[test]
fn eodhd_source_keeps_env_name() {
    let cfg = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01", tickers: [KO] }
data: { source: eodhd, cache_dir: ".cache/eodhd" }
"#,
    )
    .unwrap();
    assert_eq!(
        cfg.data,
        DataSource::Eodhd {
            api_key_env: "EODHD_API_KEY".into(),
            cache_dir: Some(".cache/eodhd".into()),
        }
    );
}

#[test]
fn eodhd_source_without_tickers_is_rejected() {
    let err = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01" }
data: { source: eodhd }
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("/universe/tickers"));
}

#[test]
fn sweep_grid_is_read() {
    let cfg = parse(
        r#"
universe: { start_date: "2023-01-01", end_date: "2023-02-01" }
sweep:
  days_after_dividend: [0, 1, 2]
  days_before_earnings: [1, 5]
"#,
    )
    .unwrap();
    assert_eq!(cfg.sweep.days_after_dividend, vec![0, 1, 2]);
    assert_eq!(cfg.sweep.days_before_earnings, vec![1, 5]);
    assert!(!cfg.sweep.is_empty());
}
