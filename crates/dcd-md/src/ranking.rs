//! Top-N ranking by market capitalization.
//!
//! For each calendar day the universe is ranked by each ticker's most recent
//! market cap on or before that day. Market caps are published sparsely
//! (weekly at best), so the latest known value stands in for the day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::calendar::DailyCalendar;
use crate::{MarketCapSeries, TickerBundle};

/// Date → top-N tickers ordered by descending market cap.
pub type TopStocksByDate = BTreeMap<NaiveDate, Vec<String>>;

/// Market cap series usable for ranking: fetch `Ok` and non-empty.
pub fn market_caps_for_ranking(
    bundles: &BTreeMap<String, TickerBundle>,
) -> BTreeMap<String, MarketCapSeries> {
    bundles
        .iter()
        .filter_map(|(ticker, b)| {
            if b.market_cap_status.is_ok() && !b.market_caps.is_empty() {
                Some((ticker.clone(), b.market_caps.clone()))
            } else {
                warn!(ticker = %ticker, status = ?b.market_cap_status, "no market caps; not ranked");
                None
            }
        })
        .collect()
}

/// Top `n` tickers on `date`.
///
/// Ties on market cap are broken by ticker ascending. Tickers with no
/// observation on or before `date` are skipped.
pub fn top_n_on(caps: &BTreeMap<String, MarketCapSeries>, date: NaiveDate, n: usize) -> Vec<String> {
    let mut latest: Vec<(&str, f64)> = caps
        .iter()
        .filter_map(|(ticker, series)| {
            series
                .range(..=date)
                .next_back()
                .map(|(_, v)| (ticker.as_str(), *v))
        })
        .collect();
    latest.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    latest.into_iter().take(n).map(|(t, _)| t.to_string()).collect()
}

/// Rank every day in `[start, end]`. Days where no ticker has data are
/// omitted rather than mapped to an empty list.
pub fn rank_top_n(
    caps: &BTreeMap<String, MarketCapSeries>,
    start: NaiveDate,
    end: NaiveDate,
    n: usize,
) -> TopStocksByDate {
    let mut out = TopStocksByDate::new();
    let Some(cal) = DailyCalendar::span(start, end) else {
        return out;
    };
    for day in cal.days() {
        let top = top_n_on(caps, day, n);
        if top.is_empty() {
            debug!(%day, "no market caps on or before day");
            continue;
        }
        out.insert(day, top);
    }
    out
}
