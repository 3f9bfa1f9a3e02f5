//! Domain model for the stock context.

pub mod aggregates;
pub mod commands;
