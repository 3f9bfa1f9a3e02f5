//! Concurrency strategy configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Default number of optimistic retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 50;

/// Default base delay between optimistic retries and lease polls.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Default lease time-to-live for the distributed lock.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(10);

/// Which concurrency-control policy guards the decrement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Per-record in-process lock held across load and store.
    #[default]
    Pessimistic,
    /// Revision-checked store with bounded retry.
    Optimistic,
    /// Per-record lease from an external lock service.
    #[serde(alias = "distributed-lock", alias = "distributed_lock")]
    Distributed,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pessimistic => "pessimistic",
            Self::Optimistic => "optimistic",
            Self::Distributed => "distributed",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pessimistic" => Ok(Self::Pessimistic),
            "optimistic" => Ok(Self::Optimistic),
            "distributed" | "distributed-lock" | "distributed_lock" => Ok(Self::Distributed),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown concurrency strategy: {other}"
            ))),
        }
    }
}

/// Configuration surface for the decrement path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyConfig {
    /// Active strategy.
    pub strategy: StrategyKind,
    /// Maximum wait for exclusive access. `None` waits forever.
    /// Applies to the pessimistic and distributed strategies.
    pub lock_timeout: Option<Duration>,
    /// Retries after the first optimistic attempt before giving up.
    pub max_retries: u32,
    /// Base delay for optimistic retries and lease polling; doubled per
    /// attempt and capped.
    pub retry_backoff: Duration,
    /// Lease time-to-live for the distributed strategy.
    pub lease_ttl: Duration,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            lock_timeout: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            lease_ttl: DEFAULT_LEASE_TTL,
        }
    }
}

impl ConcurrencyConfig {
    /// Returns a default configuration for `strategy`.
    #[must_use]
    pub fn for_strategy(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Sets the lock-wait timeout.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Sets the optimistic retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the lease time-to-live.
    #[must_use]
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Checks the configuration for values no strategy can honour.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a zero lease TTL or a zero
    /// lock timeout.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.lease_ttl.is_zero() {
            return Err(DomainError::InvalidArgument(
                "lease_ttl must be greater than zero".into(),
            ));
        }
        if self.lock_timeout.is_some_and(|t| t.is_zero()) {
            return Err(DomainError::InvalidArgument(
                "lock_timeout must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}
