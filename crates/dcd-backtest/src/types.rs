use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use dcd_md::{TickerSeries, TopStocksByDate};
use dcd_portfolio::Micros;

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Buy this many calendar days after an ex-dividend date.
    pub days_after_dividend: u32,
    /// Sell this many calendar days before the next earnings report.
    pub days_before_earnings: u32,
    /// Total capital, split evenly across pools.
    pub initial_capital: Micros,
    pub num_pools: usize,
}

impl SimulationConfig {
    pub fn new(
        days_after_dividend: u32,
        days_before_earnings: u32,
        initial_capital: Micros,
        num_pools: usize,
    ) -> Self {
        Self {
            days_after_dividend,
            days_before_earnings,
            initial_capital,
            num_pools,
        }
    }

    /// Same run with different day offsets.
    pub fn with_offsets(&self, days_after_dividend: u32, days_before_earnings: u32) -> Self {
        Self {
            days_after_dividend,
            days_before_earnings,
            ..self.clone()
        }
    }
}

/// Immutable simulator input.
///
/// `series` must already have unpriced tickers excluded. `top_stocks`
/// determines the calendar: every day from its first to its last key.
#[derive(Clone, Debug, Default)]
pub struct SimulationInput {
    pub series: BTreeMap<String, TickerSeries>,
    pub top_stocks: TopStocksByDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    FreeCapital,
    Position(String),
}

/// One valued line of a daily snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub pool: usize,
    pub kind: EntryKind,
    pub value: Micros,
}

impl SnapshotEntry {
    pub fn ticker(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Position(t) => Some(t),
            EntryKind::FreeCapital => None,
        }
    }

    /// Human-readable label, e.g. `Pool 0 Free Capital` or `Pool 2 - KO.US`.
    pub fn label(&self) -> String {
        match &self.kind {
            EntryKind::FreeCapital => format!("Pool {} Free Capital", self.pool),
            EntryKind::Position(t) => format!("Pool {} - {}", self.pool, t),
        }
    }
}

/// Start-of-day valuation of every pool.
///
/// Entries are ordered by pool index; within a pool the free-capital entry
/// comes first, followed by the position entry when the pool is occupied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub entries: Vec<SnapshotEntry>,
}

impl DailySnapshot {
    /// Σ free-capital entries; `None` if the sum leaves `i64` micros.
    pub fn free_capital(&self) -> Option<Micros> {
        checked_sum(
            self.entries
                .iter()
                .filter(|e| e.kind == EntryKind::FreeCapital),
        )
    }

    pub fn invested(&self) -> Option<Micros> {
        checked_sum(
            self.entries
                .iter()
                .filter(|e| e.kind != EntryKind::FreeCapital),
        )
    }

    pub fn total(&self) -> Option<Micros> {
        checked_sum(self.entries.iter())
    }

    /// Free capital held by `pool` at the start of the day.
    pub fn pool_free_capital(&self, pool: usize) -> Option<Micros> {
        self.entries
            .iter()
            .find(|e| e.pool == pool && e.kind == EntryKind::FreeCapital)
            .map(|e| e.value)
    }

    /// Ticker held by `pool` at the start of the day.
    pub fn pool_ticker(&self, pool: usize) -> Option<&str> {
        self.entries
            .iter()
            .filter(|e| e.pool == pool)
            .find_map(|e| e.ticker())
    }
}

fn checked_sum<'a>(mut entries: impl Iterator<Item = &'a SnapshotEntry>) -> Option<Micros> {
    entries.try_fold(Micros::ZERO, |acc, e| acc.checked_add(e.value))
}

/// A valid buy signal that found no free pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreeCapitalError {
    pub ticker: String,
    pub date: NaiveDate,
}

impl fmt::Display for FreeCapitalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no free capital for {} on {}", self.ticker, self.date)
    }
}

/// Output of a completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub snapshots: Vec<DailySnapshot>,
    pub free_capital_errors: Vec<FreeCapitalError>,
}
