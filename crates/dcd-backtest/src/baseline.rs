//! Buy-and-hold baseline over the top-ranked tickers.
//!
//! Finds the first and last ranking dates on which the top `num_stocks`
//! tickers all have an observed (never forward-filled) price, then measures
//! each of the first date's tickers from the first to the last date.
//! Finding no such date is a normal outcome, not an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use dcd_md::{TickerSeries, TopStocksByDate};
use dcd_portfolio::Micros;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct TickerReturn {
    pub ticker: String,
    pub start_price: Micros,
    pub end_price: Micros,
    pub percent_return: f64,
    /// `None` when the window is zero days long.
    pub annual_return: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BaselineReturns {
    pub per_ticker: Vec<TickerReturn>,
    pub avg_percent_return: Option<f64>,
    pub avg_annual_return: Option<f64>,
    pub first_valid_date: Option<NaiveDate>,
    pub last_valid_date: Option<NaiveDate>,
}

fn eligible(
    series: &BTreeMap<String, TickerSeries>,
    date: NaiveDate,
    ranked: &[String],
    num_stocks: usize,
) -> bool {
    let top = &ranked[..ranked.len().min(num_stocks)];
    top.len() == num_stocks
        && top
            .iter()
            .all(|t| series.get(t).is_some_and(|s| s.has_price_on(date)))
}

pub fn calculate_returns(
    series: &BTreeMap<String, TickerSeries>,
    start: NaiveDate,
    end: NaiveDate,
    top_stocks: &TopStocksByDate,
    num_stocks: usize,
) -> BaselineReturns {
    if start > end || num_stocks == 0 {
        return BaselineReturns::default();
    }
    let window = || top_stocks.range(start..=end);

    let Some((&first, first_ranked)) =
        window().find(|(d, ranked)| eligible(series, **d, ranked, num_stocks))
    else {
        warn!(num_stocks, "no date where all top tickers have prices");
        return BaselineReturns::default();
    };
    // `first` is eligible, so the reverse scan always finds a date.
    let last = window()
        .rev()
        .find(|(d, ranked)| eligible(series, **d, ranked, num_stocks))
        .map(|(d, _)| *d)
        .unwrap_or(first);

    let total_days = (last - first).num_days();
    let mut per_ticker = Vec::new();
    for ticker in first_ranked.iter().take(num_stocks) {
        let Some(s) = series.get(ticker) else { continue };
        let (Some(&start_price), Some(&end_price)) = (s.prices.get(&first), s.prices.get(&last))
        else {
            continue;
        };
        let ratio = end_price.to_f64() / start_price.to_f64();
        let percent_return = (ratio - 1.0) * 100.0;
        let annual_return =
            (total_days > 0).then(|| (ratio.powf(365.0 / total_days as f64) - 1.0) * 100.0);
        per_ticker.push(TickerReturn {
            ticker: ticker.clone(),
            start_price,
            end_price,
            percent_return,
            annual_return,
        });
    }

    let n = per_ticker.len() as f64;
    let avg_percent_return =
        (!per_ticker.is_empty()).then(|| per_ticker.iter().map(|r| r.percent_return).sum::<f64>() / n);
    let avg_annual_return = (!per_ticker.is_empty() && total_days > 0).then(|| {
        per_ticker
            .iter()
            .filter_map(|r| r.annual_return)
            .sum::<f64>()
            / n
    });

    info!(%first, %last, tickers = per_ticker.len(), "baseline computed");
    BaselineReturns {
        per_ticker,
        avg_percent_return,
        avg_annual_return,
        first_valid_date: Some(first),
        last_valid_date: Some(last),
    }
}
