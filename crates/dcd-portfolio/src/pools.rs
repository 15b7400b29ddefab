//! dcd-portfolio: pool bank
//!
//! A fixed-size, index-ordered set of capital pools. Each pool either sits on
//! free capital or holds exactly one position with its scheduled sale.
//!
//! Responsibilities (pure, no IO, no prices lookup):
//! - Split initial capital evenly across pools.
//! - First-fit pool selection by ascending index.
//! - Open a position with *all* of a pool's free capital.
//! - Settle a pending sale and credit the proceeds back to the same pool.
//! - Keep the running realized gain so capital conservation can be checked:
//!   `Σ free + Σ cost basis == initial + realized`.
//! - Refuse any settlement whose proceeds would push that total out of the
//!   `i64` micros range.

use chrono::NaiveDate;

use crate::fixedpoint::Micros;
use crate::types::{ActivePosition, Holding, OpenRequest, PendingSale, Pool, Settlement};

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolBankError {
    /// `num_pools == 0`.
    ZeroPools,
    /// Initial capital must be strictly positive.
    NonPositiveCapital(Micros),
    /// Pool index outside `0..len`.
    PoolOutOfRange { index: usize, len: usize },
    /// Attempted to open a position in a pool that already holds one.
    PoolOccupied { index: usize },
    /// Attempted to open a position in a pool with no free capital.
    NoFreeCapital { index: usize },
    /// Attempted to settle a pool that holds nothing.
    NothingToSettle { index: usize },
    /// Buy price must be strictly positive.
    NonPositivePrice { ticker: String, price: Micros },
    /// Fixed-point arithmetic left the i64 range.
    Overflow { index: usize },
    /// A structural invariant does not hold (should be unreachable).
    InvariantViolation(String),
}

impl std::fmt::Display for PoolBankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroPools => write!(f, "num_pools must be >= 1"),
            Self::NonPositiveCapital(c) => write!(f, "initial capital must be > 0 (got {c})"),
            Self::PoolOutOfRange { index, len } => {
                write!(f, "pool index {index} out of range (pools={len})")
            }
            Self::PoolOccupied { index } => write!(f, "pool {index} already holds a position"),
            Self::NoFreeCapital { index } => write!(f, "pool {index} has no free capital"),
            Self::NothingToSettle { index } => write!(f, "pool {index} has no pending sale"),
            Self::NonPositivePrice { ticker, price } => {
                write!(f, "price for '{ticker}' must be > 0 (got {price})")
            }
            Self::Overflow { index } => write!(f, "fixed-point overflow in pool {index}"),
            Self::InvariantViolation(msg) => write!(f, "pool invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for PoolBankError {}

// ─── PoolBank ────────────────────────────────────────────────────────────────

/// Owned pool state for one simulation run.
///
/// Never shared between runs: every run builds its own bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolBank {
    pools: Vec<Pool>,
    initial_capital: Micros,
    realized_gain: Micros,
}

impl PoolBank {
    /// Split `initial_capital` across `num_pools` pools.
    ///
    /// Remainder micros go to the lowest-index pools (see [`Micros::split_even`]).
    pub fn new(initial_capital: Micros, num_pools: usize) -> Result<Self, PoolBankError> {
        if num_pools == 0 {
            return Err(PoolBankError::ZeroPools);
        }
        if !initial_capital.is_positive() {
            return Err(PoolBankError::NonPositiveCapital(initial_capital));
        }
        let pools = initial_capital
            .split_even(num_pools)
            .into_iter()
            .enumerate()
            .map(|(i, cap)| Pool::new(i, cap))
            .collect();
        Ok(Self {
            pools,
            initial_capital,
            realized_gain: Micros::ZERO,
        })
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn initial_capital(&self) -> Micros {
        self.initial_capital
    }

    /// Sum of gains (and losses) realized by settled sales so far.
    pub fn realized_gain(&self) -> Micros {
        self.realized_gain
    }

    pub fn total_free_capital(&self) -> Micros {
        self.pools.iter().map(|p| p.free_capital).sum()
    }

    /// Σ invested amounts of open positions (buy-time cost basis).
    pub fn total_cost_basis(&self) -> Micros {
        self.pools
            .iter()
            .filter_map(|p| p.position())
            .map(|pos| pos.invested)
            .sum()
    }

    /// First pool, by ascending index, that is unoccupied with free capital > 0.
    pub fn first_available(&self) -> Option<usize> {
        self.pools.iter().position(Pool::is_available)
    }

    /// `(index, ticker)` of pools whose pending sale is scheduled for `date`,
    /// ascending by index.
    pub fn due_on(&self, date: NaiveDate) -> Vec<(usize, String)> {
        self.pools
            .iter()
            .filter_map(|p| {
                let sale = p.pending_sale()?;
                (sale.sell_date == date).then(|| (p.index, sale.ticker.clone()))
            })
            .collect()
    }

    /// Move all of pool `index`'s free capital into a new position.
    pub fn open(&mut self, index: usize, req: OpenRequest) -> Result<&ActivePosition, PoolBankError> {
        if !req.buy_price.is_positive() {
            return Err(PoolBankError::NonPositivePrice {
                ticker: req.ticker,
                price: req.buy_price,
            });
        }
        let pool = self.pool_mut(index)?;
        if pool.is_occupied() {
            return Err(PoolBankError::PoolOccupied { index });
        }
        if !pool.free_capital.is_positive() {
            return Err(PoolBankError::NoFreeCapital { index });
        }

        let invested = pool.free_capital;
        pool.free_capital = Micros::ZERO;
        let holding = Holding {
            position: ActivePosition {
                ticker: req.ticker.clone(),
                invested,
                buy_date: req.buy_date,
                buy_price: req.buy_price,
                sell_date: req.sell_date,
            },
            sale: PendingSale {
                ticker: req.ticker,
                buy_date: req.buy_date,
                sell_date: req.sell_date,
                buy_price: req.buy_price,
            },
        };
        Ok(&pool.holding.insert(holding).position)
    }

    /// Execute pool `index`'s pending sale at `sell_price`.
    ///
    /// `gain = (sell_price / buy_price - 1) * invested`, computed as
    /// `invested * (sell_price - buy_price) / buy_price`.
    pub fn settle(&mut self, index: usize, sell_price: Micros) -> Result<Settlement, PoolBankError> {
        let (initial_capital, prior_realized) = (self.initial_capital, self.realized_gain);
        let pool = self.pool_mut(index)?;
        let holding = pool
            .holding
            .take()
            .ok_or(PoolBankError::NothingToSettle { index })?;
        let invested = holding.position.invested;
        let buy_price = holding.position.buy_price;

        // All-or-nothing: on overflow the holding goes back untouched.
        let credited = invested.mul_ratio(sell_price - buy_price, buy_price).and_then(|gain| {
            let total_return = invested.checked_add(gain)?;
            let free_capital = pool.free_capital.checked_add(total_return)?;
            let realized_gain = prior_realized.checked_add(gain)?;
            initial_capital.checked_add(realized_gain)?;
            Some((gain, total_return, free_capital, realized_gain))
        });
        let Some((gain, total_return, free_capital, realized_gain)) = credited else {
            pool.holding = Some(holding);
            return Err(PoolBankError::Overflow { index });
        };
        pool.free_capital = free_capital;
        self.realized_gain = realized_gain;

        let settlement = Settlement {
            pool: index,
            ticker: holding.sale.ticker,
            buy_date: holding.sale.buy_date,
            sell_date: holding.sale.sell_date,
            buy_price,
            sell_price,
            invested,
            gain,
            total_return,
        };
        Ok(settlement)
    }

    /// Structural invariants plus capital conservation.
    pub fn check_invariants(&self) -> Result<(), PoolBankError> {
        for p in &self.pools {
            if p.is_occupied() && !p.free_capital.is_zero() {
                return Err(PoolBankError::InvariantViolation(format!(
                    "pool {} is occupied but has free capital {}",
                    p.index, p.free_capital
                )));
            }
            if p.free_capital < Micros::ZERO {
                return Err(PoolBankError::InvariantViolation(format!(
                    "pool {} has negative free capital {}",
                    p.index, p.free_capital
                )));
            }
        }
        let held = self.total_free_capital() + self.total_cost_basis();
        let expected = self.initial_capital + self.realized_gain;
        if held != expected {
            return Err(PoolBankError::InvariantViolation(format!(
                "capital not conserved: free+basis={held} initial+realized={expected}"
            )));
        }
        Ok(())
    }

    fn pool_mut(&mut self, index: usize) -> Result<&mut Pool, PoolBankError> {
        let len = self.pools.len();
        self.pools
            .get_mut(index)
            .ok_or(PoolBankError::PoolOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn req(ticker: &str, buy: u32, sell: u32, px: i64) -> OpenRequest {
        OpenRequest {
            ticker: ticker.to_string(),
            buy_date: d(buy),
            buy_price: Micros::from_units(px),
            sell_date: d(sell),
        }
    }

    #[test]
    fn new_splits_capital_evenly() {
        let bank = PoolBank::new(Micros::from_units(5_000), 5).unwrap();
        assert_eq!(bank.len(), 5);
        for p in bank.pools() {
            assert_eq!(p.free_capital, Micros::from_units(1_000));
            assert!(!p.is_occupied());
        }
        bank.check_invariants().unwrap();
    }

    #[test]
    fn new_rejects_bad_config() {
        assert_eq!(
            PoolBank::new(Micros::from_units(1), 0),
            Err(PoolBankError::ZeroPools)
        );
        assert_eq!(
            PoolBank::new(Micros::ZERO, 3),
            Err(PoolBankError::NonPositiveCapital(Micros::ZERO))
        );
    }

    #[test]
    fn first_available_is_first_fit() {
        let mut bank = PoolBank::new(Micros::from_units(3_000), 3).unwrap();
        assert_eq!(bank.first_available(), Some(0));
        bank.open(0, req("AAA", 1, 5, 10)).unwrap();
        assert_eq!(bank.first_available(), Some(1));
        bank.open(1, req("BBB", 1, 5, 10)).unwrap();
        bank.open(2, req("CCC", 1, 5, 10)).unwrap();
        assert_eq!(bank.first_available(), None);
    }

    #[test]
    fn open_moves_all_free_capital() {
        let mut bank = PoolBank::new(Micros::from_units(2_000), 2).unwrap();
        let pos = bank.open(1, req("AAA", 1, 5, 10)).unwrap().clone();
        assert_eq!(pos.invested, Micros::from_units(1_000));
        assert_eq!(bank.pools()[1].free_capital, Micros::ZERO);
        assert!(bank.pools()[1].is_occupied());
        assert_eq!(bank.pools()[1].pending_sale().unwrap().sell_date, d(5));
        bank.check_invariants().unwrap();
    }

    #[test]
    fn open_rejects_occupied_pool() {
        let mut bank = PoolBank::new(Micros::from_units(1_000), 1).unwrap();
        bank.open(0, req("AAA", 1, 5, 10)).unwrap();
        assert_eq!(
            bank.open(0, req("BBB", 1, 5, 10)).unwrap_err(),
            PoolBankError::PoolOccupied { index: 0 }
        );
    }

    #[test]
    fn open_rejects_non_positive_price() {
        let mut bank = PoolBank::new(Micros::from_units(1_000), 1).unwrap();
        let err = bank.open(0, req("AAA", 1, 5, 0)).unwrap_err();
        assert!(matches!(err, PoolBankError::NonPositivePrice { .. }));
        assert!(!bank.pools()[0].is_occupied());
    }

    #[test]
    fn due_on_lists_matching_pools() {
        let mut bank = PoolBank::new(Micros::from_units(3_000), 3).unwrap();
        bank.open(0, req("AAA", 1, 5, 10)).unwrap();
        bank.open(2, req("CCC", 1, 5, 10)).unwrap();
        assert_eq!(
            bank.due_on(d(5)),
            vec![(0, "AAA".to_string()), (2, "CCC".to_string())]
        );
        assert!(bank.due_on(d(4)).is_empty());
    }

    #[test]
    fn settle_credits_total_return() {
        let mut bank = PoolBank::new(Micros::from_units(1_000), 1).unwrap();
        bank.open(0, req("AAA", 1, 5, 100)).unwrap();
        let s = bank.settle(0, Micros::from_units(110)).unwrap();
        assert_eq!(s.gain, Micros::from_units(100));
        assert_eq!(s.total_return, Micros::from_units(1_100));
        assert_eq!(bank.pools()[0].free_capital, Micros::from_units(1_100));
        assert!(!bank.pools()[0].is_occupied());
        assert_eq!(bank.realized_gain(), Micros::from_units(100));
        bank.check_invariants().unwrap();
    }

    #[test]
    fn settle_at_a_loss() {
        let mut bank = PoolBank::new(Micros::from_units(1_000), 1).unwrap();
        bank.open(0, req("AAA", 1, 5, 100)).unwrap();
        let s = bank.settle(0, Micros::from_units(75)).unwrap();
        assert_eq!(s.gain, Micros::from_units(-250));
        assert_eq!(bank.pools()[0].free_capital, Micros::from_units(750));
        bank.check_invariants().unwrap();
    }

    #[test]
    fn settle_empty_pool_errors() {
        let mut bank = PoolBank::new(Micros::from_units(1_000), 1).unwrap();
        assert_eq!(
            bank.settle(0, Micros::from_units(1)).unwrap_err(),
            PoolBankError::NothingToSettle { index: 0 }
        );
    }

    #[test]
    fn out_of_range_index() {
        let mut bank = PoolBank::new(Micros::from_units(1_000), 1).unwrap();
        assert_eq!(
            bank.open(3, req("AAA", 1, 5, 10)).unwrap_err(),
            PoolBankError::PoolOutOfRange { index: 3, len: 1 }
        );
    }
}
