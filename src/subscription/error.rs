//! Error types for the subscriber side.

use crate::store::StoreError;
use thiserror::Error;

/// Failures of a push channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is gone.
    #[error("Transport closed")]
    Closed,

    /// A send did not finish within the configured limit.
    #[error("Send timed out")]
    Timeout,

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Reasons a viewer could not be registered.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectError {
    /// The baseline snapshot could not be read.
    #[error("Failed to load snapshot: {0}")]
    Snapshot(#[from] StoreError),

    #[error("Failed to encode snapshot: {0}")]
    Encode(String),

    /// The baseline snapshot could not be pushed.
    #[error("Failed to send snapshot: {0}")]
    Transport(#[from] TransportError),

    #[error("Subscription manager is shutting down")]
    ShuttingDown,
}
