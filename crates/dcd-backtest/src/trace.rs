//! Structured trace of simulator decisions.
//!
//! The engine reports every trade and every skipped signal to a
//! [`SimObserver`]. Tests use [`RecordingObserver`]; the CLI uses
//! [`TracingObserver`].

use chrono::NaiveDate;
use dcd_portfolio::{Micros, Settlement};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    Bought {
        date: NaiveDate,
        pool: usize,
        ticker: String,
        invested: Micros,
        buy_price: Micros,
        sell_date: NaiveDate,
    },
    Sold {
        date: NaiveDate,
        settlement: Settlement,
    },
    /// Valid signal, every pool occupied or empty.
    NoFreeCapital { date: NaiveDate, ticker: String },
    /// No earnings report after the buy day.
    SkippedNoEarnings {
        date: NaiveDate,
        ticker: String,
        ex_dividend: NaiveDate,
    },
    /// Sell date falls outside the priced calendar.
    SkippedSellDateUnpriced {
        date: NaiveDate,
        ticker: String,
        sell_date: NaiveDate,
    },
    /// `days_before_earnings` pushes the sell date to or before the buy day.
    SkippedSellNotAfterBuy {
        date: NaiveDate,
        ticker: String,
        sell_date: NaiveDate,
    },
    SkippedNoBuyPrice { date: NaiveDate, ticker: String },
}

impl TraceEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            TraceEvent::Bought { date, .. }
            | TraceEvent::Sold { date, .. }
            | TraceEvent::NoFreeCapital { date, .. }
            | TraceEvent::SkippedNoEarnings { date, .. }
            | TraceEvent::SkippedSellDateUnpriced { date, .. }
            | TraceEvent::SkippedSellNotAfterBuy { date, .. }
            | TraceEvent::SkippedNoBuyPrice { date, .. } => *date,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            TraceEvent::SkippedNoEarnings { .. }
                | TraceEvent::SkippedSellDateUnpriced { .. }
                | TraceEvent::SkippedSellNotAfterBuy { .. }
                | TraceEvent::SkippedNoBuyPrice { .. }
        )
    }
}

pub trait SimObserver {
    fn on_event(&mut self, event: &TraceEvent);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl SimObserver for NullObserver {
    fn on_event(&mut self, _event: &TraceEvent) {}
}

/// Keeps every event in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<TraceEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bought(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Bought { .. }))
    }

    pub fn sold(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Sold { .. }))
    }

    pub fn skips(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(|e| e.is_skip())
    }
}

impl SimObserver for RecordingObserver {
    fn on_event(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl SimObserver for TracingObserver {
    fn on_event(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::Bought {
                date,
                pool,
                ticker,
                invested,
                buy_price,
                sell_date,
            } => info!(%date, pool, %ticker, %invested, %buy_price, %sell_date, "bought"),
            TraceEvent::Sold { date, settlement } => info!(
                %date,
                pool = settlement.pool,
                ticker = %settlement.ticker,
                gain = %settlement.gain,
                total_return = %settlement.total_return,
                "sold"
            ),
            TraceEvent::NoFreeCapital { date, ticker } => {
                warn!(%date, %ticker, "no free capital")
            }
            other => debug!(event = ?other, "signal skipped"),
        }
    }
}
