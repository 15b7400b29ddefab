//! CSV data directory (dcd-md boundary).
//!
//! A data directory holds up to four files, one row per observation:
//!
//! | File              | Columns                          |
//! |-------------------|----------------------------------|
//! | `prices.csv`      | `ticker,date,adjusted_close`     |
//! | `dividends.csv`   | `ticker,date`                    |
//! | `earnings.csv`    | `ticker,report_date`             |
//! | `market_caps.csv` | `ticker,date,value`              |
//!
//! Dates are `YYYY-MM-DD`. Prices are decimal strings converted without
//! floating point (see [`crate::normalizer::parse_price`]). A missing file
//! leaves that series `Empty` for every ticker.
//!
//! [`write_csv_dir`] produces the same layout, so fetched data can be saved
//! once and replayed offline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::normalizer::{parse_price, NormalizerError};
use crate::{FetchStatus, MarketCapSeries, PriceSeries, TickerBundle};

pub const PRICES_FILE: &str = "prices.csv";
pub const DIVIDENDS_FILE: &str = "dividends.csv";
pub const EARNINGS_FILE: &str = "earnings.csv";
pub const MARKET_CAPS_FILE: &str = "market_caps.csv";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum IngestError {
    Io { path: PathBuf, msg: String },
    /// Structural or type error reported by the csv reader.
    Csv { file: String, msg: String },
    Price {
        file: String,
        line: u64,
        err: NormalizerError,
    },
    InvalidMarketCap { file: String, line: u64, value: f64 },
    DuplicateRow {
        file: String,
        ticker: String,
        date: NaiveDate,
    },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io { path, msg } => write!(f, "io error on '{}': {msg}", path.display()),
            IngestError::Csv { file, msg } => write!(f, "{file}: {msg}"),
            IngestError::Price { file, line, err } => write!(f, "{file} line {line}: {err}"),
            IngestError::InvalidMarketCap { file, line, value } => {
                write!(f, "{file} line {line}: market cap must be finite and >= 0, got {value}")
            }
            IngestError::DuplicateRow { file, ticker, date } => {
                write!(f, "{file}: duplicate row for {ticker} on {date}")
            }
        }
    }
}

impl std::error::Error for IngestError {}

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
struct PriceRow {
    ticker: String,
    date: NaiveDate,
    adjusted_close: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct DividendRow {
    ticker: String,
    date: NaiveDate,
}

#[derive(Debug, Deserialize, Serialize)]
struct EarningsRow {
    ticker: String,
    report_date: NaiveDate,
}

#[derive(Debug, Deserialize, Serialize)]
struct MarketCapRow {
    ticker: String,
    date: NaiveDate,
    value: f64,
}

fn read_rows<T, R>(rdr: R, file: &str) -> Result<Vec<(u64, T)>, IngestError>
where
    T: DeserializeOwned,
    R: Read,
{
    let csv_err = |e: csv::Error| IngestError::Csv {
        file: file.to_string(),
        msg: e.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut out = Vec::new();
    for rec in reader.records() {
        let rec = rec.map_err(csv_err)?;
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        let row = rec.deserialize::<T>(Some(&headers)).map_err(csv_err)?;
        out.push((line, row));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

pub fn parse_prices<R: Read>(rdr: R) -> Result<BTreeMap<String, PriceSeries>, IngestError> {
    let mut out: BTreeMap<String, PriceSeries> = BTreeMap::new();
    for (line, row) in read_rows::<PriceRow, _>(rdr, PRICES_FILE)? {
        let px = parse_price(&row.adjusted_close, "adjusted_close").map_err(|err| {
            IngestError::Price {
                file: PRICES_FILE.to_string(),
                line,
                err,
            }
        })?;
        let series = out.entry(row.ticker.clone()).or_default();
        if series.insert(row.date, px).is_some() {
            return Err(IngestError::DuplicateRow {
                file: PRICES_FILE.to_string(),
                ticker: row.ticker,
                date: row.date,
            });
        }
    }
    Ok(out)
}

pub fn parse_dividends<R: Read>(
    rdr: R,
) -> Result<BTreeMap<String, BTreeSet<NaiveDate>>, IngestError> {
    let mut out: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
    for (_, row) in read_rows::<DividendRow, _>(rdr, DIVIDENDS_FILE)? {
        out.entry(row.ticker).or_default().insert(row.date);
    }
    Ok(out)
}

pub fn parse_earnings<R: Read>(
    rdr: R,
) -> Result<BTreeMap<String, BTreeSet<NaiveDate>>, IngestError> {
    let mut out: BTreeMap<String, BTreeSet<NaiveDate>> = BTreeMap::new();
    for (_, row) in read_rows::<EarningsRow, _>(rdr, EARNINGS_FILE)? {
        out.entry(row.ticker).or_default().insert(row.report_date);
    }
    Ok(out)
}

pub fn parse_market_caps<R: Read>(
    rdr: R,
) -> Result<BTreeMap<String, MarketCapSeries>, IngestError> {
    let mut out: BTreeMap<String, MarketCapSeries> = BTreeMap::new();
    for (line, row) in read_rows::<MarketCapRow, _>(rdr, MARKET_CAPS_FILE)? {
        if !row.value.is_finite() || row.value < 0.0 {
            return Err(IngestError::InvalidMarketCap {
                file: MARKET_CAPS_FILE.to_string(),
                line,
                value: row.value,
            });
        }
        out.entry(row.ticker).or_default().insert(row.date, row.value);
    }
    Ok(out)
}

fn open_optional(path: &Path) -> Result<Option<std::fs::File>, IngestError> {
    match std::fs::File::open(path) {
        Ok(f) => Ok(Some(f)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "data file missing; series left empty");
            Ok(None)
        }
        Err(e) => Err(IngestError::Io {
            path: path.to_path_buf(),
            msg: e.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Directory load / save
// ---------------------------------------------------------------------------

/// Load a data directory into per-ticker bundles.
///
/// `tickers` restricts the result; when empty, every ticker seen in any file
/// is returned. A requested ticker with no rows anywhere still gets a bundle
/// (all series `Empty`) so exclusion can report it.
pub fn load_csv_dir(
    dir: &Path,
    tickers: &[String],
) -> Result<BTreeMap<String, TickerBundle>, IngestError> {
    let prices = open_optional(&dir.join(PRICES_FILE))?
        .map(parse_prices)
        .transpose()?;
    let dividends = open_optional(&dir.join(DIVIDENDS_FILE))?
        .map(parse_dividends)
        .transpose()?;
    let earnings = open_optional(&dir.join(EARNINGS_FILE))?
        .map(parse_earnings)
        .transpose()?;
    let caps = open_optional(&dir.join(MARKET_CAPS_FILE))?
        .map(parse_market_caps)
        .transpose()?;

    let universe: BTreeSet<String> = if tickers.is_empty() {
        let mut all = BTreeSet::new();
        if let Some(m) = &prices {
            all.extend(m.keys().cloned());
        }
        for m in [&dividends, &earnings].into_iter().flatten() {
            all.extend(m.keys().cloned());
        }
        if let Some(m) = &caps {
            all.extend(m.keys().cloned());
        }
        all
    } else {
        tickers.iter().cloned().collect()
    };

    let mut out = BTreeMap::new();
    for ticker in universe {
        let mut b = TickerBundle::empty(ticker.clone());
        if let Some(s) = prices.as_ref().and_then(|m| m.get(&ticker)) {
            b.series.prices = s.clone();
        }
        if let Some(s) = dividends.as_ref().and_then(|m| m.get(&ticker)) {
            b.series.dividends = s.clone();
        }
        if let Some(s) = earnings.as_ref().and_then(|m| m.get(&ticker)) {
            b.series.earnings = s.clone();
        }
        if let Some(s) = caps.as_ref().and_then(|m| m.get(&ticker)) {
            b.market_caps = s.clone();
        }
        b.price_status = FetchStatus::from_rows(!b.series.prices.is_empty());
        b.dividends_status = FetchStatus::from_rows(!b.series.dividends.is_empty());
        b.earnings_status = FetchStatus::from_rows(!b.series.earnings.is_empty());
        b.market_cap_status = FetchStatus::from_rows(!b.market_caps.is_empty());
        out.insert(ticker, b);
    }
    tracing::info!(dir = %dir.display(), tickers = out.len(), "loaded csv data directory");
    Ok(out)
}

/// Write bundles as a data directory readable by [`load_csv_dir`].
pub fn write_csv_dir(
    dir: &Path,
    bundles: &BTreeMap<String, TickerBundle>,
) -> Result<(), IngestError> {
    std::fs::create_dir_all(dir).map_err(|e| IngestError::Io {
        path: dir.to_path_buf(),
        msg: e.to_string(),
    })?;

    write_rows(
        &dir.join(PRICES_FILE),
        bundles.values().flat_map(|b| {
            b.series.prices.iter().map(|(date, px)| PriceRow {
                ticker: b.ticker.clone(),
                date: *date,
                adjusted_close: px.to_string(),
            })
        }),
    )?;
    write_rows(
        &dir.join(DIVIDENDS_FILE),
        bundles.values().flat_map(|b| {
            b.series.dividends.iter().map(|date| DividendRow {
                ticker: b.ticker.clone(),
                date: *date,
            })
        }),
    )?;
    write_rows(
        &dir.join(EARNINGS_FILE),
        bundles.values().flat_map(|b| {
            b.series.earnings.iter().map(|date| EarningsRow {
                ticker: b.ticker.clone(),
                report_date: *date,
            })
        }),
    )?;
    write_rows(
        &dir.join(MARKET_CAPS_FILE),
        bundles.values().flat_map(|b| {
            b.market_caps.iter().map(|(date, value)| MarketCapRow {
                ticker: b.ticker.clone(),
                date: *date,
                value: *value,
            })
        }),
    )
}

fn write_rows<T, I>(path: &Path, rows: I) -> Result<(), IngestError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let io_err = |msg: String| IngestError::Io {
        path: path.to_path_buf(),
        msg,
    };
    let file = std::fs::File::create(path).map_err(|e| io_err(e.to_string()))?;
    let mut w = csv::Writer::from_writer(file);
    for row in rows {
        w.serialize(row).map_err(|e| io_err(e.to_string()))?;
    }
    w.flush().map_err(|e| io_err(e.to_string()))?;
    Ok(())
}
