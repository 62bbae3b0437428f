//! Error types for the ticket state machine.

use crate::domain::TicketStatus;
use thiserror::Error;

/// Why a requested ticket transition was refused.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransitionError {
    /// The requested status is not reachable from the current one.
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition { from: TicketStatus, to: TicketStatus },

    /// A forced transition was requested by an actor without operator rights.
    #[error("Override not permitted for actor {actor}")]
    OverrideNotPermitted { actor: String },
}
