//! dcd-backtest
//!
//! Dividend-capture allocation simulator.
//! - Calendar-driven day loop: snapshot, settle due sales, evaluate buys
//! - First-fit pool selection, all-in buys, one position per pool
//! - Structured trace via `SimObserver`
//! - Strategy metrics, buy-and-hold baseline, per-ticker combined series
//! - Isolated parallel parameter sweep
//!
//! Deterministic: identical input yields identical snapshots and errors.

mod baseline;
mod combined;
mod engine;
mod metrics;
mod sweep;
mod trace;
mod types;

pub use baseline::{calculate_returns, BaselineReturns, TickerReturn};
pub use combined::{combine_by_ticker, CombinedRow, CombinedSeries, FREE_CAPITAL_COLUMN};
pub use engine::{validate_config, AllocationEngine, BacktestError, Simulation};
pub use metrics::{compute_metrics, StrategyMetrics};
pub use sweep::{sweep, SweepGrid, SweepPoint};
pub use trace::{NullObserver, RecordingObserver, SimObserver, TraceEvent, TracingObserver};
pub use types::{
    DailySnapshot, EntryKind, FreeCapitalError, SimulationConfig, SimulationInput,
    SimulationReport, SnapshotEntry,
};
