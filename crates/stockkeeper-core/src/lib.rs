//! Shared domain abstractions for Stockkeeper.
//!
//! This crate defines the traits and types the stock context and its
//! storage backends depend on. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod lock;
pub mod rng;
pub mod store;
