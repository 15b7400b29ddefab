//! Parameter sweep over day offsets.
//!
//! Each grid point is an independent run with its own pools, so points are
//! evaluated in parallel with rayon. Results come back in grid order.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

use crate::engine::{validate_config, AllocationEngine, BacktestError};
use crate::metrics::{compute_metrics, StrategyMetrics};
use crate::types::{SimulationConfig, SimulationInput};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepGrid {
    pub days_after_dividend: Vec<u32>,
    pub days_before_earnings: Vec<u32>,
}

impl SweepGrid {
    /// Cartesian product, `days_after_dividend` major.
    pub fn points(&self) -> Vec<(u32, u32)> {
        self.days_after_dividend
            .iter()
            .flat_map(|&a| self.days_before_earnings.iter().map(move |&b| (a, b)))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SweepPoint {
    pub days_after_dividend: u32,
    pub days_before_earnings: u32,
    pub metrics: StrategyMetrics,
    pub free_capital_errors: usize,
}

pub fn sweep(
    input: &SimulationInput,
    base: &SimulationConfig,
    grid: &SweepGrid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SweepPoint>, BacktestError> {
    validate_config(base)?;
    let points = grid.points();
    info!(points = points.len(), "starting sweep");

    points
        .par_iter()
        .map(|&(after, before)| -> Result<SweepPoint, BacktestError> {
            let config = base.with_offsets(after, before);
            let capital = config.initial_capital;
            let report = AllocationEngine::new(config).run(input)?;
            Ok(SweepPoint {
                days_after_dividend: after,
                days_before_earnings: before,
                metrics: compute_metrics(&report.snapshots, start, end, capital),
                free_capital_errors: report.free_capital_errors.len(),
            })
        })
        .collect()
}
