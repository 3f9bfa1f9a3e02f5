//! Application layer for the stock context.

pub mod command_handlers;
pub mod concurrency;
pub mod query_handlers;
