//! dcd-portfolio
//!
//! Capital pools for the dividend-capture allocator.
//! - Fixed-point money (`Micros`)
//! - `Pool` aggregate: free capital, or exactly one position + pending sale
//! - `PoolBank`: first-fit selection, all-in buys, sale settlement
//! - Pure deterministic logic (no IO, no time, no price lookup)

mod fixedpoint;
mod types;

pub mod pools;

pub use fixedpoint::{Micros, MICROS_SCALE};
pub use pools::{PoolBank, PoolBankError};
pub use types::{ActivePosition, Holding, OpenRequest, PendingSale, Pool, Settlement};
