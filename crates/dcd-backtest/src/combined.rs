//! Per-ticker view of a snapshot sequence.
//!
//! Pools are summed away: one free-capital column across all pools, and one
//! column per ticker summed across whichever pools hold it.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use dcd_portfolio::Micros;

use crate::types::{DailySnapshot, EntryKind};

pub const FREE_CAPITAL_COLUMN: &str = "Free Capital";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinedRow {
    pub date: NaiveDate,
    pub free_capital: Micros,
    /// Aligned with [`CombinedSeries::tickers`]; zero when not held.
    pub holdings: Vec<Micros>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CombinedSeries {
    /// Tickers in first-seen order.
    pub tickers: Vec<String>,
    pub rows: Vec<CombinedRow>,
}

impl CombinedSeries {
    /// `Free Capital` followed by the tickers.
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once(FREE_CAPITAL_COLUMN)
            .chain(self.tickers.iter().map(String::as_str))
            .collect()
    }

    pub fn value(&self, row: usize, ticker: &str) -> Option<Micros> {
        let col = self.tickers.iter().position(|t| t == ticker)?;
        self.rows.get(row).map(|r| r.holdings[col])
    }
}

pub fn combine_by_ticker(snapshots: &[DailySnapshot]) -> CombinedSeries {
    let mut tickers: Vec<String> = Vec::new();
    let mut column: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in snapshots.iter().flat_map(|s| &s.entries) {
        if let EntryKind::Position(t) = &entry.kind {
            if !column.contains_key(t.as_str()) {
                column.insert(t.as_str(), tickers.len());
                tickers.push(t.clone());
            }
        }
    }

    let rows = snapshots
        .iter()
        .map(|s| {
            let mut free_capital = Micros::ZERO;
            let mut holdings = vec![Micros::ZERO; tickers.len()];
            for entry in &s.entries {
                match &entry.kind {
                    EntryKind::FreeCapital => {
                        free_capital = free_capital.saturating_add(entry.value);
                    }
                    EntryKind::Position(t) => {
                        if let Some(&i) = column.get(t.as_str()) {
                            holdings[i] = holdings[i].saturating_add(entry.value);
                        }
                    }
                }
            }
            CombinedRow {
                date: s.date,
                free_capital,
                holdings,
            }
        })
        .collect();

    CombinedSeries { tickers, rows }
}
