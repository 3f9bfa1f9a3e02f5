//! Lease-based lock service abstraction.
//!
//! Used when several independent service instances share one stock store
//! and an in-process mutex no longer provides mutual exclusion.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// A time-bounded grant of exclusive access to one stock record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// The stock record the lease covers.
    pub stock_id: Uuid,
    /// Token identifying the holder. Release only succeeds for this owner.
    pub owner: Uuid,
    /// After this instant the lease may be taken over by another owner.
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// Returns whether the lease has lapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// External lease-based lock service keyed by stock id.
#[async_trait]
pub trait LeaseLockService: Send + Sync {
    /// Try once to take the lease for `stock_id` on behalf of `owner`.
    ///
    /// Returns `Ok(None)` while another owner holds an unexpired lease. An
    /// expired lease is taken over.
    async fn try_acquire(
        &self,
        stock_id: Uuid,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<Option<Lease>, DomainError>;

    /// Release `lease` if it is still held by its owner.
    ///
    /// Returns `Ok(false)` when the lease expired and was taken over, in
    /// which case the current holder's lease is left untouched.
    async fn release(&self, lease: &Lease) -> Result<bool, DomainError>;
}
