//! The stock bounded context.
//!
//! Responsible for the stock counter aggregate and for guarding its
//! load → validate → decrease → persist cycle with a pluggable
//! concurrency strategy.

pub mod application;
pub mod domain;
