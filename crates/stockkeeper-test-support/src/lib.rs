//! Shared test doubles and utilities for Stockkeeper.

mod clock;
mod harness;
mod rng;
mod store;

pub use clock::{FixedClock, ManualClock};
pub use harness::{ContentionReport, run_contention};
pub use rng::{MockRng, SequenceRng};
pub use store::{ConflictingStockStore, FailingStockStore, GatedStockStore};
