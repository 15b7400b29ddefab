//! Typed run configuration and boundary validation.
//!
//! Reads (all under the effective layered config):
//!
//! | Pointer                          | Default            |
//! |----------------------------------|--------------------|
//! | `/strategy/days_after_dividend`  | 0                  |
//! | `/strategy/days_before_earnings` | 0                  |
//! | `/strategy/initial_capital`      | 1000               |
//! | `/strategy/num_pools`            | 5                  |
//! | `/universe/tickers`              | `[]` (csv: all)    |
//! | `/universe/top_n`                | 5                  |
//! | `/universe/start_date`           | required           |
//! | `/universe/end_date`             | required           |
//! | `/universe/market_cap_aliases`   | NESN.SW: NSRGY.US  |
//! | `/data/source`                   | `csv`              |
//! | `/data/dir`                      | `data` (csv)       |
//! | `/data/cache_dir`                | none (eodhd)       |
//! | `/data/api_key_env`              | `EODHD_API_KEY`    |
//! | `/data/require_dividends`        | false              |
//! | `/baseline/num_stocks`           | `top_n`            |
//! | `/sweep/days_after_dividend`     | `[]`               |
//! | `/sweep/days_before_earnings`    | `[]`               |
//!
//! Validation failures are run-fatal and reported before anything runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde_json::Value;

const DEFAULT_NUM_POOLS: u64 = 5;
const DEFAULT_TOP_N: u64 = 5;
const DEFAULT_INITIAL_CAPITAL: f64 = 1_000.0;
const DEFAULT_API_KEY_ENV: &str = "EODHD_API_KEY";
const DEFAULT_DATA_DIR: &str = "data";

/// Listings whose market cap is only published under another symbol.
const DEFAULT_MARKET_CAP_ALIASES: &[(&str, &str)] = &[("NESN.SW", "NSRGY.US")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv {
        dir: PathBuf,
    },
    Eodhd {
        /// Name of the env var holding the API key (never the key itself).
        api_key_env: String,
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSpec {
    pub days_after_dividend: Vec<u32>,
    pub days_before_earnings: Vec<u32>,
}

impl SweepSpec {
    pub fn is_empty(&self) -> bool {
        self.days_after_dividend.is_empty() || self.days_before_earnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub days_after_dividend: u32,
    pub days_before_earnings: u32,
    /// Currency units; converted to fixed point by the caller.
    pub initial_capital: f64,
    pub num_pools: usize,
    pub tickers: Vec<String>,
    pub top_n: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub market_cap_aliases: BTreeMap<String, String>,
    pub data: DataSource,
    pub require_dividends: bool,
    pub num_stocks: usize,
    pub sweep: SweepSpec,
}

impl StrategyConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let num_pools = opt_u64(v, "/strategy/num_pools")?.unwrap_or(DEFAULT_NUM_POOLS);
        let top_n = opt_u64(v, "/universe/top_n")?.unwrap_or(DEFAULT_TOP_N);
        let num_stocks = opt_u64(v, "/baseline/num_stocks")?.unwrap_or(top_n);

        let data = match opt_str(v, "/data/source")?.unwrap_or("csv") {
            "csv" => DataSource::Csv {
                dir: PathBuf::from(opt_str(v, "/data/dir")?.unwrap_or(DEFAULT_DATA_DIR)),
            },
            "eodhd" => DataSource::Eodhd {
                api_key_env: opt_str(v, "/data/api_key_env")?
                    .unwrap_or(DEFAULT_API_KEY_ENV)
                    .to_string(),
                cache_dir: opt_str(v, "/data/cache_dir")?.map(PathBuf::from),
            },
            other => bail!("CONFIG_INVALID /data/source: expected csv|eodhd, got {other:?}"),
        };

        let cfg = StrategyConfig {
            days_after_dividend: opt_u32(v, "/strategy/days_after_dividend")?.unwrap_or(0),
            days_before_earnings: opt_u32(v, "/strategy/days_before_earnings")?.unwrap_or(0),
            initial_capital: opt_f64(v, "/strategy/initial_capital")?
                .unwrap_or(DEFAULT_INITIAL_CAPITAL),
            num_pools: to_usize(num_pools, "/strategy/num_pools")?,
            tickers: opt_str_list(v, "/universe/tickers")?,
            top_n: to_usize(top_n, "/universe/top_n")?,
            start_date: req_date(v, "/universe/start_date")?,
            end_date: req_date(v, "/universe/end_date")?,
            market_cap_aliases: opt_str_map(v, "/universe/market_cap_aliases")?
                .unwrap_or_else(|| {
                    DEFAULT_MARKET_CAP_ALIASES
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                }),
            data,
            require_dividends: opt_bool(v, "/data/require_dividends")?.unwrap_or(false),
            num_stocks: to_usize(num_stocks, "/baseline/num_stocks")?,
            sweep: SweepSpec {
                days_after_dividend: opt_u32_list(v, "/sweep/days_after_dividend")?,
                days_before_earnings: opt_u32_list(v, "/sweep/days_before_earnings")?,
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_pools < 1 {
            bail!("CONFIG_INVALID /strategy/num_pools: must be >= 1");
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            bail!(
                "CONFIG_INVALID /strategy/initial_capital: must be > 0, got {}",
                self.initial_capital
            );
        }
        if self.top_n < 1 {
            bail!("CONFIG_INVALID /universe/top_n: must be >= 1");
        }
        if self.num_stocks < 1 {
            bail!("CONFIG_INVALID /baseline/num_stocks: must be >= 1");
        }
        if self.start_date > self.end_date {
            bail!(
                "CONFIG_INVALID /universe: start_date {} is after end_date {}",
                self.start_date,
                self.end_date
            );
        }
        if matches!(self.data, DataSource::Eodhd { .. }) && self.tickers.is_empty() {
            bail!("CONFIG_INVALID /universe/tickers: eodhd source needs an explicit ticker list");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pointer readers. Missing and null are both "absent".
// ---------------------------------------------------------------------------

fn present<'a>(v: &'a Value, ptr: &str) -> Option<&'a Value> {
    v.pointer(ptr).filter(|x| !x.is_null())
}

fn opt_u64(v: &Value, ptr: &str) -> Result<Option<u64>> {
    present(v, ptr)
        .map(|x| {
            x.as_u64()
                .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}: expected non-negative integer, got {x}"))
        })
        .transpose()
}

fn opt_u32(v: &Value, ptr: &str) -> Result<Option<u32>> {
    opt_u64(v, ptr)?
        .map(|n| u32::try_from(n).with_context(|| format!("CONFIG_INVALID {ptr}: {n} out of range")))
        .transpose()
}

fn to_usize(n: u64, ptr: &str) -> Result<usize> {
    usize::try_from(n).with_context(|| format!("CONFIG_INVALID {ptr}: {n} out of range"))
}

fn opt_f64(v: &Value, ptr: &str) -> Result<Option<f64>> {
    present(v, ptr)
        .map(|x| {
            x.as_f64()
                .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}: expected number, got {x}"))
        })
        .transpose()
}

fn opt_bool(v: &Value, ptr: &str) -> Result<Option<bool>> {
    present(v, ptr)
        .map(|x| {
            x.as_bool()
                .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}: expected bool, got {x}"))
        })
        .transpose()
}

fn opt_str<'a>(v: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    present(v, ptr)
        .map(|x| {
            x.as_str()
                .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}: expected string, got {x}"))
        })
        .transpose()
}

fn req_date(v: &Value, ptr: &str) -> Result<NaiveDate> {
    let s = opt_str(v, ptr)?.ok_or_else(|| anyhow!("CONFIG_MISSING {ptr}"))?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("CONFIG_INVALID {ptr}: expected YYYY-MM-DD, got {s:?}"))
}

fn opt_array<'a>(v: &'a Value, ptr: &str) -> Result<&'a [Value]> {
    match present(v, ptr) {
        None => Ok(&[]),
        Some(Value::Array(a)) => Ok(a),
        Some(x) => bail!("CONFIG_INVALID {ptr}: expected list, got {x}"),
    }
}

/// Accepts a YAML list or a single comma-separated string.
fn opt_str_list(v: &Value, ptr: &str) -> Result<Vec<String>> {
    if let Some(Value::String(s)) = present(v, ptr) {
        return Ok(s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect());
    }
    opt_array(v, ptr)?
        .iter()
        .map(|x| {
            x.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}: expected list of strings"))
        })
        .collect()
}

fn opt_u32_list(v: &Value, ptr: &str) -> Result<Vec<u32>> {
    opt_array(v, ptr)?
        .iter()
        .map(|x| {
            x.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}: expected list of day counts, got {x}"))
        })
        .collect()
}

fn opt_str_map(v: &Value, ptr: &str) -> Result<Option<BTreeMap<String, String>>> {
    match present(v, ptr) {
        None => Ok(None),
        Some(Value::Object(m)) => m
            .iter()
            .map(|(k, x)| {
                x.as_str()
                    .map(|s| (k.clone(), s.to_string()))
                    .ok_or_else(|| anyhow!("CONFIG_INVALID {ptr}/{k}: expected string"))
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Some),
        Some(x) => bail!("CONFIG_INVALID {ptr}: expected mapping, got {x}"),
    }
}
