use chrono::NaiveDate;

use crate::fixedpoint::Micros;

/// A live position held by a pool.
///
/// `invested` is the capital moved out of the pool at buy time (its cost basis).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivePosition {
    pub ticker: String,
    pub invested: Micros,
    pub buy_date: NaiveDate,
    pub buy_price: Micros,
    pub sell_date: NaiveDate,
}

impl ActivePosition {
    /// Mark-to-market value at `price`: `invested * price / buy_price`.
    pub fn value_at(&self, price: Micros) -> Option<Micros> {
        self.invested.mul_ratio(price, self.buy_price)
    }
}

/// The scheduled exit attached to a pool's position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSale {
    pub ticker: String,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub buy_price: Micros,
}

/// Position plus its pending sale. Created and destroyed together, so a pool
/// can never hold one without the other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holding {
    pub position: ActivePosition,
    pub sale: PendingSale,
}

/// One capital slot.
///
/// Occupied iff `holding.is_some()`; an occupied pool has zero free capital.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    pub index: usize,
    pub free_capital: Micros,
    pub holding: Option<Holding>,
}

impl Pool {
    pub fn new(index: usize, free_capital: Micros) -> Self {
        Self {
            index,
            free_capital,
            holding: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.holding.is_some()
    }

    /// Unoccupied with capital to deploy.
    pub fn is_available(&self) -> bool {
        !self.is_occupied() && self.free_capital.is_positive()
    }

    pub fn position(&self) -> Option<&ActivePosition> {
        self.holding.as_ref().map(|h| &h.position)
    }

    pub fn pending_sale(&self) -> Option<&PendingSale> {
        self.holding.as_ref().map(|h| &h.sale)
    }
}

/// Parameters for opening a position in a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    pub ticker: String,
    pub buy_date: NaiveDate,
    pub buy_price: Micros,
    pub sell_date: NaiveDate,
}

/// Result of settling a pool's pending sale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub pool: usize,
    pub ticker: String,
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub buy_price: Micros,
    pub sell_price: Micros,
    pub invested: Micros,
    /// `(sell_price / buy_price - 1) * invested`; negative on a loss.
    pub gain: Micros,
    /// `invested + gain`, credited back to the pool's free capital.
    pub total_return: Micros,
}
