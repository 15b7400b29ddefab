//! dcd-md
//!
//! Market Series Store boundary.
//!
//! This crate owns the per-ticker input series (adjusted close prices,
//! dividend ex-dates, earnings report dates, market capitalization), their
//! fetch status, and the transforms the simulator needs before it starts:
//! daily calendar + forward fill, fail-fast ticker exclusion, and the
//! top-N-by-market-cap ranking. It does **not** simulate anything.

pub mod calendar;
pub mod ingest_csv;
pub mod normalizer;
pub mod provider;
pub mod quality;
pub mod ranking;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use dcd_portfolio::Micros;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use calendar::{forward_fill, DailyCalendar, FilledPrices};
pub use ingest_csv::{load_csv_dir, write_csv_dir, IngestError};
pub use normalizer::{micros_from_json, parse_price, NormalizerError};
pub use provider::{fetch_all, EodhdProvider, FetchSeriesRequest, ResponseCache, SeriesProvider};
pub use quality::{coverage_report, SeriesCoverage, TickerCoverage};
pub use ranking::{market_caps_for_ranking, rank_top_n, top_n_on, TopStocksByDate};

/// Date → adjusted close, as observed (never filled).
pub type PriceSeries = BTreeMap<NaiveDate, Micros>;

/// Date → market capitalization in currency units.
pub type MarketCapSeries = BTreeMap<NaiveDate, f64>;

/// Outcome of fetching one series for one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    /// Request succeeded but returned no rows.
    Empty,
    Failed {
        /// HTTP status, when there was a response at all.
        code: Option<u16>,
        reason: String,
    },
}

impl FetchStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchStatus::Ok)
    }

    pub fn failed(code: Option<u16>, reason: impl Into<String>) -> Self {
        FetchStatus::Failed {
            code,
            reason: reason.into(),
        }
    }

    /// `Ok` when `non_empty`, `Empty` otherwise.
    pub fn from_rows(non_empty: bool) -> Self {
        if non_empty {
            FetchStatus::Ok
        } else {
            FetchStatus::Empty
        }
    }
}

/// Immutable per-run input for one ticker, as the simulator sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerSeries {
    pub prices: PriceSeries,
    pub dividends: BTreeSet<NaiveDate>,
    pub earnings: BTreeSet<NaiveDate>,
}

impl TickerSeries {
    /// Earliest earnings report strictly after `date`.
    pub fn next_earnings_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.earnings.range((Excluded(date), Unbounded)).next().copied()
    }

    /// Strict membership in the observed (unfilled) price index.
    pub fn has_price_on(&self, date: NaiveDate) -> bool {
        self.prices.contains_key(&date)
    }
}

/// Everything fetched for one ticker, tagged with per-series fetch status.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerBundle {
    pub ticker: String,
    pub series: TickerSeries,
    pub market_caps: MarketCapSeries,
    pub price_status: FetchStatus,
    pub dividends_status: FetchStatus,
    pub earnings_status: FetchStatus,
    pub market_cap_status: FetchStatus,
}

impl TickerBundle {
    /// A bundle with no data and every status `Empty`.
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            series: TickerSeries::default(),
            market_caps: MarketCapSeries::new(),
            price_status: FetchStatus::Empty,
            dividends_status: FetchStatus::Empty,
            earnings_status: FetchStatus::Empty,
            market_cap_status: FetchStatus::Empty,
        }
    }
}

/// Why a ticker was dropped before the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    PriceFetchFailed,
    NoPrices,
    NoDividends,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excluded {
    pub ticker: String,
    pub reason: ExclusionReason,
}

/// Drop tickers whose price fetch failed or whose price series is empty.
///
/// Fail-fast: this runs before the simulation, never during it.
pub fn exclude_unpriced(bundles: &mut BTreeMap<String, TickerBundle>) -> Vec<Excluded> {
    let mut out = Vec::new();
    bundles.retain(|ticker, b| {
        let reason = match (&b.price_status, b.series.prices.is_empty()) {
            (FetchStatus::Failed { .. }, _) => Some(ExclusionReason::PriceFetchFailed),
            (_, true) => Some(ExclusionReason::NoPrices),
            _ => None,
        };
        match reason {
            Some(reason) => {
                warn!(ticker = %ticker, ?reason, status = ?b.price_status, "excluding ticker");
                out.push(Excluded {
                    ticker: ticker.clone(),
                    reason,
                });
                false
            }
            None => true,
        }
    });
    out
}

/// Drop tickers that have no dividend ex-dates at all.
pub fn exclude_without_dividends(bundles: &mut BTreeMap<String, TickerBundle>) -> Vec<Excluded> {
    let mut out = Vec::new();
    bundles.retain(|ticker, b| {
        if b.series.dividends.is_empty() {
            warn!(ticker = %ticker, "excluding ticker without dividend data");
            out.push(Excluded {
                ticker: ticker.clone(),
                reason: ExclusionReason::NoDividends,
            });
            false
        } else {
            true
        }
    });
    out
}

/// Project bundles down to the series map consumed by the simulator.
pub fn series_map(bundles: &BTreeMap<String, TickerBundle>) -> BTreeMap<String, TickerSeries> {
    bundles
        .iter()
        .map(|(t, b)| (t.clone(), b.series.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn priced(ticker: &str) -> TickerBundle {
        let mut b = TickerBundle::empty(ticker);
        b.series.prices.insert(d(1, 2), Micros::from_units(10));
        b.price_status = FetchStatus::Ok;
        b
    }

    #[test]
    fn next_earnings_is_strictly_after() {
        let mut s = TickerSeries::default();
        s.earnings.insert(d(1, 10));
        s.earnings.insert(d(4, 10));
        assert_eq!(s.next_earnings_after(d(1, 9)), Some(d(1, 10)));
        assert_eq!(s.next_earnings_after(d(1, 10)), Some(d(4, 10)));
        assert_eq!(s.next_earnings_after(d(4, 10)), None);
    }

    #[test]
    fn exclude_unpriced_drops_failed_and_empty() {
        let mut bundles = BTreeMap::new();
        bundles.insert("OK".to_string(), priced("OK"));
        bundles.insert("EMPTY".to_string(), TickerBundle::empty("EMPTY"));
        let mut failed = priced("FAIL");
        failed.price_status = FetchStatus::failed(Some(404), "not found");
        bundles.insert("FAIL".to_string(), failed);

        let excluded = exclude_unpriced(&mut bundles);
        assert_eq!(bundles.keys().collect::<Vec<_>>(), vec!["OK"]);
        assert_eq!(
            excluded,
            vec![
                Excluded {
                    ticker: "EMPTY".into(),
                    reason: ExclusionReason::NoPrices
                },
                Excluded {
                    ticker: "FAIL".into(),
                    reason: ExclusionReason::PriceFetchFailed
                },
            ]
        );
    }

    #[test]
    fn exclude_without_dividends_keeps_payers() {
        let mut bundles = BTreeMap::new();
        let mut payer = priced("PAY");
        payer.series.dividends.insert(d(2, 1));
        bundles.insert("PAY".to_string(), payer);
        bundles.insert("NOPAY".to_string(), priced("NOPAY"));

        let excluded = exclude_without_dividends(&mut bundles);
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].ticker, "NOPAY");
        assert!(bundles.contains_key("PAY"));
    }
}
