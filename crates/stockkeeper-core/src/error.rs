//! Domain error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A stock record was not found.
    #[error("stock not found: {0}")]
    StockNotFound(Uuid),

    /// The caller supplied an argument the domain rejects (e.g. a negative amount).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The decrease would take the quantity below zero.
    #[error("insufficient stock on {stock_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The stock record that was asked for more than it holds.
        stock_id: Uuid,
        /// The amount requested.
        requested: i64,
        /// The quantity available when the request was evaluated.
        available: i64,
    },

    /// Optimistic concurrency conflict reported by the store.
    #[error("concurrency conflict on stock {stock_id}: expected revision {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The stock record that had the conflict.
        stock_id: Uuid,
        /// The expected revision.
        expected: i64,
        /// The actual revision found.
        actual: i64,
    },

    /// Exclusive access could not be obtained within the lock timeout.
    #[error("stock {stock_id} is busy: lock not acquired within {waited:?}")]
    Busy {
        /// The stock record whose lock was contended.
        stock_id: Uuid,
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// The optimistic retry budget was exhausted.
    #[error("contention exceeded on stock {stock_id} after {attempts} attempts")]
    ContentionExceeded {
        /// The stock record under contention.
        stock_id: Uuid,
        /// Number of attempts made, including the first.
        attempts: u32,
    },

    /// A storage or lock-service collaborator failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Flat classification of [`DomainError`] for callers that only branch on
/// the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Unknown stock id.
    NotFound,
    /// Caller error.
    InvalidArgument,
    /// Business rejection; the record is unchanged.
    InsufficientStock,
    /// Store-level revision mismatch.
    Conflict,
    /// Lock wait exceeded.
    Busy,
    /// Optimistic retry budget exhausted.
    ContentionExceeded,
    /// Collaborator failure.
    StorageUnavailable,
}

impl ErrorKind {
    /// Whether a caller may reasonably retry the request later.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict | Self::Busy | Self::ContentionExceeded)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::InsufficientStock => "insufficient_stock",
            Self::Conflict => "conflict",
            Self::Busy => "busy",
            Self::ContentionExceeded => "contention_exceeded",
            Self::StorageUnavailable => "storage_unavailable",
        };
        f.write_str(name)
    }
}

impl DomainError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StockNotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::ContentionExceeded { .. } => ErrorKind::ContentionExceeded,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }
}
