//! Scenario: repeated runs and capital conservation over a busy universe.
//!
//! # Invariants under test
//!
//! 1. Two runs over identical input produce identical snapshots and errors.
//! 2. Every end-of-day pool bank conserves capital:
//!    `Σ free + Σ cost basis == initial + realized`.
//! 3. No pool is ever occupied while holding free capital.

mod common;

use common::{busy, config};
use dcd_backtest::{AllocationEngine, NullObserver, Simulation};

#[test]
fn identical_inputs_identical_outputs() {
    let f = busy();
    let engine = AllocationEngine::new(config(1, 2, 10_000, 2));
    let a = engine.run(&f.input).unwrap();
    let b = engine.run(&f.input).unwrap();
    assert_eq!(a, b);
    assert!(!a.free_capital_errors.is_empty());
}

#[test]
fn capital_is_conserved_every_day() {
    let f = busy();
    let mut sim = Simulation::prepare(&f.input, config(1, 2, 10_000, 2)).unwrap();
    while sim.step(&mut NullObserver).unwrap().is_some() {
        let bank = sim.bank();
        assert_eq!(
            bank.total_free_capital() + bank.total_cost_basis(),
            bank.initial_capital() + bank.realized_gain()
        );
        for p in sim.pools() {
            assert!(!(p.is_occupied() && p.free_capital.is_positive()));
        }
    }
}
