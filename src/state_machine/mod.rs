//! # Ticket State Machine
//!
//! Pure transition logic for kitchen tickets. No I/O, no clocks.
//!
//! ```text
//! NEW ──▶ IN_QUEUE ──▶ READY ──▶ SERVED ──▶ COMPLETED
//!  │          │
//!  └──────────┴──▶ CANCELLED
//! ```
//!
//! Forward moves may skip states (`NEW → READY` is legal). Nothing moves
//! backwards and nothing leaves `COMPLETED` or `CANCELLED`, except through an
//! operator override, which bypasses the table entirely and is reported as
//! `forced` so subscribers can tell it apart from the normal flow.

pub mod error;

pub use error::*;

use crate::domain::{Actor, TicketStatus};

/// How a transition was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Regular kitchen flow, checked against the edge table.
    Normal,
    /// Privileged operator path, skips the edge table.
    Override,
}

/// A requested target status plus the path used to request it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    pub target: TicketStatus,
    pub kind: TransitionKind,
}

impl TransitionRequest {
    pub fn to(target: TicketStatus) -> Self {
        Self {
            target,
            kind: TransitionKind::Normal,
        }
    }

    pub fn forced(target: TicketStatus) -> Self {
        Self {
            target,
            kind: TransitionKind::Override,
        }
    }
}

impl From<TicketStatus> for TransitionRequest {
    fn from(target: TicketStatus) -> Self {
        Self::to(target)
    }
}

/// Result of a successful [`apply_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TicketStatus,
    pub to: TicketStatus,
    /// Set when the change went through the override path.
    pub forced: bool,
}

impl Transition {
    /// Re-applying the current status succeeds without changing anything.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Legal targets of a normal transition out of `from`.
pub fn successors(from: TicketStatus) -> &'static [TicketStatus] {
    use TicketStatus::*;
    match from {
        New => &[InQueue, Ready, Served, Completed, Cancelled],
        InQueue => &[Ready, Served, Completed, Cancelled],
        Ready => &[Served, Completed],
        Served => &[Completed],
        Completed | Cancelled => &[],
    }
}

pub fn is_legal_edge(from: TicketStatus, to: TicketStatus) -> bool {
    successors(from).contains(&to)
}

/// Validates a requested transition and returns the resulting status change.
///
/// # Errors
/// - [`TransitionError::OverrideNotPermitted`] if an override comes from a non-operator.
/// - [`TransitionError::IllegalTransition`] if a normal request targets a status
///   outside [`successors`] of the current one.
pub fn apply_transition(
    current: TicketStatus,
    request: TransitionRequest,
    actor: &Actor,
) -> Result<Transition, TransitionError> {
    let forced = match request.kind {
        TransitionKind::Override => {
            if !actor.is_operator() {
                return Err(TransitionError::OverrideNotPermitted {
                    actor: actor.id.clone(),
                });
            }
            true
        }
        TransitionKind::Normal => false,
    };

    if request.target == current {
        return Ok(Transition {
            from: current,
            to: current,
            forced: false,
        });
    }

    if !forced && !is_legal_edge(current, request.target) {
        return Err(TransitionError::IllegalTransition {
            from: current,
            to: request.target,
        });
    }

    Ok(Transition {
        from: current,
        to: request.target,
        forced,
    })
}
