//! Per-ticker coverage report.
//!
//! Summarises, for each ticker, the first and last date and the number of
//! observations of every input series, next to its fetch status. Used to
//! eyeball whether a universe has enough history before running it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{FetchStatus, TickerBundle};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesCoverage {
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub count: usize,
}

impl SeriesCoverage {
    fn of<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut cov = SeriesCoverage::default();
        for d in dates {
            cov.first = Some(cov.first.map_or(d, |f| f.min(d)));
            cov.last = Some(cov.last.map_or(d, |l| l.max(d)));
            cov.count += 1;
        }
        cov
    }
}

impl fmt::Display for SeriesCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first, self.last) {
            (Some(a), Some(b)) => write!(f, "{a}..{b} ({})", self.count),
            _ => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerCoverage {
    pub ticker: String,
    pub prices: SeriesCoverage,
    pub dividends: SeriesCoverage,
    pub earnings: SeriesCoverage,
    pub market_caps: SeriesCoverage,
    pub price_status: FetchStatus,
    pub dividends_status: FetchStatus,
    pub earnings_status: FetchStatus,
    pub market_cap_status: FetchStatus,
}

pub fn coverage_report(bundles: &BTreeMap<String, TickerBundle>) -> Vec<TickerCoverage> {
    bundles
        .values()
        .map(|b| TickerCoverage {
            ticker: b.ticker.clone(),
            prices: SeriesCoverage::of(b.series.prices.keys().copied()),
            dividends: SeriesCoverage::of(b.series.dividends.iter().copied()),
            earnings: SeriesCoverage::of(b.series.earnings.iter().copied()),
            market_caps: SeriesCoverage::of(b.market_caps.keys().copied()),
            price_status: b.price_status.clone(),
            dividends_status: b.dividends_status.clone(),
            earnings_status: b.earnings_status.clone(),
            market_cap_status: b.market_cap_status.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcd_portfolio::Micros;

    #[test]
    fn summarises_ranges_and_counts() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let mut b = TickerBundle::empty("AAA");
        b.series.prices.insert(d(3, 1), Micros::from_units(1));
        b.series.prices.insert(d(1, 1), Micros::from_units(1));
        b.series.dividends.insert(d(2, 1));
        let mut bundles = BTreeMap::new();
        bundles.insert("AAA".to_string(), b);

        let report = coverage_report(&bundles);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].prices.first, Some(d(1, 1)));
        assert_eq!(report[0].prices.last, Some(d(3, 1)));
        assert_eq!(report[0].prices.count, 2);
        assert_eq!(report[0].dividends.to_string(), "2024-02-01..2024-02-01 (1)");
        assert_eq!(report[0].earnings.to_string(), "-");
    }
}
