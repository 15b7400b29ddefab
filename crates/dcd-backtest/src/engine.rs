use std::collections::BTreeMap;
use std::fmt;

use chrono::{Days, NaiveDate};
use dcd_md::{forward_fill, DailyCalendar, FilledPrices, TickerSeries};
use dcd_portfolio::{Micros, OpenRequest, Pool, PoolBank, PoolBankError};
use tracing::info;

use crate::trace::{NullObserver, SimObserver, TraceEvent};
use crate::types::{
    DailySnapshot, EntryKind, FreeCapitalError, SimulationConfig, SimulationInput,
    SimulationReport, SnapshotEntry,
};

/// Backtest error variants.
///
/// Configuration errors are raised before the first day; the remaining
/// variants signal a broken internal invariant and abort the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BacktestError {
    ZeroPools,
    NonPositiveCapital(Micros),
    /// A held ticker had no price on a day it had to be valued or sold.
    MissingPrice { ticker: String, date: NaiveDate },
    /// Revaluation overflowed `i64` micros.
    ValuationOverflow { ticker: String, date: NaiveDate },
    /// The day's pool values do not sum inside `i64` micros.
    SnapshotOverflow { date: NaiveDate },
    Pool(PoolBankError),
}

impl fmt::Display for BacktestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestError::ZeroPools => write!(f, "num_pools must be >= 1"),
            BacktestError::NonPositiveCapital(c) => {
                write!(f, "initial_capital must be > 0, got {c}")
            }
            BacktestError::MissingPrice { ticker, date } => {
                write!(f, "no price for held ticker {ticker} on {date}")
            }
            BacktestError::ValuationOverflow { ticker, date } => {
                write!(f, "valuation overflow for {ticker} on {date}")
            }
            BacktestError::SnapshotOverflow { date } => {
                write!(f, "snapshot total overflow on {date}")
            }
            BacktestError::Pool(e) => write!(f, "pool: {e}"),
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<PoolBankError> for BacktestError {
    fn from(e: PoolBankError) -> Self {
        BacktestError::Pool(e)
    }
}

pub fn validate_config(config: &SimulationConfig) -> Result<(), BacktestError> {
    if config.num_pools == 0 {
        return Err(BacktestError::ZeroPools);
    }
    if !config.initial_capital.is_positive() {
        return Err(BacktestError::NonPositiveCapital(config.initial_capital));
    }
    Ok(())
}

/// A run in progress, advanced one calendar day per [`Simulation::step`].
///
/// Per day, in order:
/// 1. snapshot start-of-day state (positions marked at the day's filled price)
/// 2. settle every sale due today
/// 3. if the day is ranked, evaluate buy signals for its top-N tickers
///
/// Pools freed in step 2 are available to step 3 of the same day.
pub struct Simulation<'a> {
    input: &'a SimulationInput,
    config: SimulationConfig,
    calendar: Option<DailyCalendar>,
    filled: BTreeMap<&'a str, FilledPrices>,
    bank: PoolBank,
    cursor: Option<NaiveDate>,
    free_capital_errors: Vec<FreeCapitalError>,
}

impl<'a> Simulation<'a> {
    /// Validate `config`, build the calendar and forward-filled prices, and
    /// split capital into pools.
    pub fn prepare(
        input: &'a SimulationInput,
        config: SimulationConfig,
    ) -> Result<Self, BacktestError> {
        validate_config(&config)?;
        let bank = PoolBank::new(config.initial_capital, config.num_pools)?;
        let calendar = DailyCalendar::covering(input.top_stocks.keys().copied());
        let filled = match &calendar {
            Some(cal) => input
                .series
                .iter()
                .map(|(t, s)| (t.as_str(), forward_fill(&s.prices, cal)))
                .collect(),
            None => BTreeMap::new(),
        };
        Ok(Self {
            input,
            config,
            calendar,
            filled,
            bank,
            cursor: calendar.map(|c| c.first()),
            free_capital_errors: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// `None` when there are no ranked days.
    pub fn calendar(&self) -> Option<&DailyCalendar> {
        self.calendar.as_ref()
    }

    /// Pool state after the most recent step.
    pub fn pools(&self) -> &[Pool] {
        self.bank.pools()
    }

    pub fn bank(&self) -> &PoolBank {
        &self.bank
    }

    /// Day the next call to [`Simulation::step`] will process.
    pub fn next_day(&self) -> Option<NaiveDate> {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn free_capital_errors(&self) -> &[FreeCapitalError] {
        &self.free_capital_errors
    }

    pub fn into_free_capital_errors(self) -> Vec<FreeCapitalError> {
        self.free_capital_errors
    }

    /// Process one day. Returns its start-of-day snapshot, or `None` once
    /// the calendar is exhausted.
    pub fn step(
        &mut self,
        observer: &mut dyn SimObserver,
    ) -> Result<Option<DailySnapshot>, BacktestError> {
        let Some(day) = self.cursor else {
            return Ok(None);
        };

        let input = self.input;
        let snapshot = self.snapshot(day)?;
        self.settle_due(day, observer)?;
        if let Some(top) = input.top_stocks.get(&day) {
            self.evaluate_buys(day, top, observer)?;
        }
        self.bank.check_invariants()?;

        self.cursor = match self.calendar {
            Some(cal) if day < cal.last() => day.succ_opt(),
            _ => None,
        };
        Ok(Some(snapshot))
    }

    fn price(&self, ticker: &str, day: NaiveDate) -> Option<Micros> {
        self.filled.get(ticker).and_then(|p| p.get(day))
    }

    fn snapshot(&self, day: NaiveDate) -> Result<DailySnapshot, BacktestError> {
        let mut entries = Vec::with_capacity(self.bank.len() * 2);
        for pool in self.bank.pools() {
            entries.push(SnapshotEntry {
                pool: pool.index,
                kind: EntryKind::FreeCapital,
                value: pool.free_capital,
            });
            if let Some(pos) = pool.position() {
                let px = self
                    .price(&pos.ticker, day)
                    .ok_or_else(|| BacktestError::MissingPrice {
                        ticker: pos.ticker.clone(),
                        date: day,
                    })?;
                let value = pos
                    .value_at(px)
                    .ok_or_else(|| BacktestError::ValuationOverflow {
                        ticker: pos.ticker.clone(),
                        date: day,
                    })?;
                entries.push(SnapshotEntry {
                    pool: pool.index,
                    kind: EntryKind::Position(pos.ticker.clone()),
                    value,
                });
            }
        }
        let snapshot = DailySnapshot { date: day, entries };
        if snapshot.total().is_none() {
            return Err(BacktestError::SnapshotOverflow { date: day });
        }
        Ok(snapshot)
    }

    fn settle_due(
        &mut self,
        day: NaiveDate,
        observer: &mut dyn SimObserver,
    ) -> Result<(), BacktestError> {
        for (index, ticker) in self.bank.due_on(day) {
            let px = self
                .price(&ticker, day)
                .ok_or_else(|| BacktestError::MissingPrice {
                    ticker: ticker.clone(),
                    date: day,
                })?;
            let settlement = self.bank.settle(index, px)?;
            observer.on_event(&TraceEvent::Sold {
                date: day,
                settlement,
            });
        }
        Ok(())
    }

    fn evaluate_buys(
        &mut self,
        day: NaiveDate,
        top: &[String],
        observer: &mut dyn SimObserver,
    ) -> Result<(), BacktestError> {
        let Some(ex_dividend) = day.checked_sub_days(Days::new(self.config.days_after_dividend.into()))
        else {
            return Ok(());
        };

        let input = self.input;
        for ticker in top {
            let Some(series) = input.series.get(ticker) else {
                continue;
            };
            if !series.dividends.contains(&ex_dividend) {
                continue;
            }
            if let Some(event) = self.try_buy(day, ex_dividend, ticker, series)? {
                observer.on_event(&event);
            }
        }
        Ok(())
    }

    /// Resolve one dividend-triggered signal into a trace event.
    fn try_buy(
        &mut self,
        day: NaiveDate,
        ex_dividend: NaiveDate,
        ticker: &str,
        series: &TickerSeries,
    ) -> Result<Option<TraceEvent>, BacktestError> {
        let Some(next_earnings) = series.next_earnings_after(day) else {
            return Ok(Some(TraceEvent::SkippedNoEarnings {
                date: day,
                ticker: ticker.to_string(),
                ex_dividend,
            }));
        };
        let sell_date = next_earnings
            .checked_sub_days(Days::new(self.config.days_before_earnings.into()))
            .unwrap_or(NaiveDate::MIN);
        if sell_date <= day {
            return Ok(Some(TraceEvent::SkippedSellNotAfterBuy {
                date: day,
                ticker: ticker.to_string(),
                sell_date,
            }));
        }
        if self.price(ticker, sell_date).is_none() {
            return Ok(Some(TraceEvent::SkippedSellDateUnpriced {
                date: day,
                ticker: ticker.to_string(),
                sell_date,
            }));
        }
        let Some(buy_price) = self.price(ticker, day) else {
            return Ok(Some(TraceEvent::SkippedNoBuyPrice {
                date: day,
                ticker: ticker.to_string(),
            }));
        };

        let Some(index) = self.bank.first_available() else {
            self.free_capital_errors.push(FreeCapitalError {
                ticker: ticker.to_string(),
                date: day,
            });
            return Ok(Some(TraceEvent::NoFreeCapital {
                date: day,
                ticker: ticker.to_string(),
            }));
        };

        let pos = self.bank.open(
            index,
            OpenRequest {
                ticker: ticker.to_string(),
                buy_date: day,
                buy_price,
                sell_date,
            },
        )?;
        Ok(Some(TraceEvent::Bought {
            date: day,
            pool: index,
            ticker: ticker.to_string(),
            invested: pos.invested,
            buy_price,
            sell_date,
        }))
    }
}

/// Drives a [`Simulation`] to completion.
#[derive(Clone, Debug)]
pub struct AllocationEngine {
    config: SimulationConfig,
}

impl AllocationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run(&self, input: &SimulationInput) -> Result<SimulationReport, BacktestError> {
        self.run_with_observer(input, &mut NullObserver)
    }

    pub fn run_with_observer(
        &self,
        input: &SimulationInput,
        observer: &mut dyn SimObserver,
    ) -> Result<SimulationReport, BacktestError> {
        let mut sim = Simulation::prepare(input, self.config.clone())?;
        let mut snapshots = Vec::with_capacity(sim.calendar().map_or(0, |c| c.len()));
        while let Some(snapshot) = sim.step(observer)? {
            snapshots.push(snapshot);
        }
        let free_capital_errors = sim.into_free_capital_errors();
        info!(
            days = snapshots.len(),
            tickers = input.series.len(),
            free_capital_errors = free_capital_errors.len(),
            days_after_dividend = self.config.days_after_dividend,
            days_before_earnings = self.config.days_before_earnings,
            "simulation complete"
        );
        Ok(SimulationReport {
            snapshots,
            free_capital_errors,
        })
    }
}
