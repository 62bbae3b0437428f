//! Writer-facing error taxonomy.
//!
//! Every writer call returns `Result<_, SyncError>`. Subscriber-local
//! delivery problems never appear here; they are logged and end only the
//! affected subscription (see [`crate::subscription::TeardownReason`]).

use crate::domain::{OrderId, TicketId, TicketStatus};
use crate::state_machine::TransitionError;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the write coordinator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    /// The requested status is not reachable from the current one.
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: TicketStatus, to: TicketStatus },

    /// An override was requested by an actor without the operator role.
    #[error("Override not permitted for actor {actor}")]
    OverrideNotPermitted { actor: String },

    /// The per-order lock could not be acquired in time.
    #[error("Timed out after {waited:?} waiting for the lock on order {order_id}")]
    LockTimeout { order_id: OrderId, waited: Duration },

    /// The durable store rejected the write; nothing was published.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    /// The referenced order or ticket does not exist.
    #[error("{0} not found")]
    NotFound(Missing),

    /// A line item failed validation.
    #[error("Invalid item: {0}")]
    InvalidItem(String),
}

/// What a [`SyncError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Order(OrderId),
    Ticket(TicketId),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Order(id) => write!(f, "Order {id}"),
            Missing::Ticket(id) => write!(f, "Ticket {id}"),
        }
    }
}

impl SyncError {
    /// Whether the same call may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::LockTimeout { .. } | SyncError::PersistenceFailure(_)
        )
    }
}

impl From<TransitionError> for SyncError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::IllegalTransition { from, to } => {
                SyncError::IllegalTransition { from, to }
            }
            TransitionError::OverrideNotPermitted { actor } => {
                SyncError::OverrideNotPermitted { actor }
            }
        }
    }
}
