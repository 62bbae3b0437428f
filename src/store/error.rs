//! Error types for the durable store boundary.

use thiserror::Error;

/// Failures reported by an [`OrderStore`](super::OrderStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write (constraint violation, aborted transaction).
    #[error("Store rejected write: {0}")]
    Rejected(String),
}
