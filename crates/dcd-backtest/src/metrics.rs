//! Strategy metrics over a snapshot sequence.
//!
//! Time in market is dollar-day weighted: every snapshot contributes its
//! invested value to the invested side and its free capital to the
//! uninvested side.

use chrono::NaiveDate;
use dcd_portfolio::{Micros, MICROS_SCALE};

use crate::types::{DailySnapshot, EntryKind};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrategyMetrics {
    /// Σ over days of invested value, in currency-unit-days.
    pub invested_capital_days: f64,
    pub uninvested_capital_days: f64,
    pub total_capital_tracked: f64,
    pub percent_time_in_market: f64,
    /// Invested + free on the last snapshot.
    pub final_value: f64,
    pub overall_return_pct: f64,
    pub annualized_return_pct: f64,
}

/// Reduce `snapshots` to summary statistics.
///
/// `start`/`end` define the annualization window (`end - start` whole days).
/// With no snapshots every figure is zero.
pub fn compute_metrics(
    snapshots: &[DailySnapshot],
    start: NaiveDate,
    end: NaiveDate,
    total_invested: Micros,
) -> StrategyMetrics {
    let Some(last) = snapshots.last() else {
        return StrategyMetrics::default();
    };

    // i128: a decade of daily sums over large capital leaves i64 range.
    let (invested, uninvested) = snapshots
        .iter()
        .flat_map(|s| &s.entries)
        .fold((0i128, 0i128), |(i, u), e| match e.kind {
            EntryKind::FreeCapital => (i, u + e.value.raw() as i128),
            EntryKind::Position(_) => (i + e.value.raw() as i128, u),
        });
    let to_units = |v: i128| v as f64 / MICROS_SCALE as f64;

    let invested_capital_days = to_units(invested);
    let uninvested_capital_days = to_units(uninvested);
    let total_capital_tracked = invested_capital_days + uninvested_capital_days;
    let percent_time_in_market = if total_capital_tracked > 0.0 {
        invested_capital_days / total_capital_tracked * 100.0
    } else {
        0.0
    };

    let final_value = to_units(
        last.entries.iter().map(|e| e.value.raw() as i128).sum(),
    );
    let capital = total_invested.to_f64();
    let total_days = (end - start).num_days();

    let overall_return_pct = if capital > 0.0 {
        (final_value - capital) / capital * 100.0
    } else {
        0.0
    };
    let annualized_return_pct = if total_days > 0 && capital > 0.0 {
        ((final_value / capital).powf(365.0 / total_days as f64) - 1.0) * 100.0
    } else {
        0.0
    };

    StrategyMetrics {
        invested_capital_days,
        uninvested_capital_days,
        total_capital_tracked,
        percent_time_in_market,
        final_value,
        overall_return_pct,
        annualized_return_pct,
    }
}
