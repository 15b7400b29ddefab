//! Shared fixtures for dcd-backtest scenario tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use dcd_backtest::{SimulationConfig, SimulationInput};
use dcd_md::TickerSeries;
use dcd_portfolio::Micros;

/// Day `n` of January 2024.
pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

pub fn units(v: i64) -> Micros {
    Micros::from_units(v)
}

/// Builder for a small universe over January 2024.
#[derive(Default)]
pub struct Fixture {
    pub input: SimulationInput,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank `tickers` (in this order) on every day in `first..=last`.
    pub fn ranked(mut self, first: u32, last: u32, tickers: &[&str]) -> Self {
        for n in first..=last {
            self.input
                .top_stocks
                .insert(day(n), tickers.iter().map(|t| t.to_string()).collect());
        }
        self
    }

    /// Daily price `px(n)` for days `first..=last`.
    pub fn prices(mut self, ticker: &str, first: u32, last: u32, px: impl Fn(u32) -> i64) -> Self {
        let s = self.series(ticker);
        for n in first..=last {
            s.prices.insert(day(n), units(px(n)));
        }
        self
    }

    pub fn dividend(mut self, ticker: &str, n: u32) -> Self {
        self.series(ticker).dividends.insert(day(n));
        self
    }

    pub fn earnings(mut self, ticker: &str, date: NaiveDate) -> Self {
        self.series(ticker).earnings.insert(date);
        self
    }

    fn series(&mut self, ticker: &str) -> &mut TickerSeries {
        self.input.series.entry(ticker.to_string()).or_default()
    }
}

pub fn config(after: u32, before: u32, capital: i64, pools: usize) -> SimulationConfig {
    SimulationConfig::new(after, before, units(capital), pools)
}

/// Four tickers ranked all month, two dividends each and earnings that
/// block some sells, so pools churn and some signals are skipped.
pub fn busy() -> Fixture {
    let mut f = Fixture::new().ranked(1, 31, &["AAA", "BBB", "CCC", "DDD"]);
    for (i, t) in ["AAA", "BBB", "CCC", "DDD"].iter().enumerate() {
        let base = 10 + i as i64 * 7;
        f = f
            .prices(t, 1, 31, move |n| base + (n as i64 * (i as i64 + 1)) % 9)
            .dividend(t, 2 + i as u32)
            .dividend(t, 12 + i as u32)
            .earnings(t, day(10 + i as u32))
            .earnings(t, day(25));
    }
    f
}
