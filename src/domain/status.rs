use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Kitchen status of a single ticket.
///
/// Declaration order is the forward order of the kitchen flow; `Cancelled`
/// sits outside that order and is only reachable from `New` or `InQueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    New,
    InQueue,
    Ready,
    Served,
    Completed,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::New,
        TicketStatus::InQueue,
        TicketStatus::Ready,
        TicketStatus::Served,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ];

    /// Position along the forward flow, `None` for `Cancelled`.
    pub fn rank(self) -> Option<u8> {
        match self {
            TicketStatus::New => Some(0),
            TicketStatus::InQueue => Some(1),
            TicketStatus::Ready => Some(2),
            TicketStatus::Served => Some(3),
            TicketStatus::Completed => Some(4),
            TicketStatus::Cancelled => None,
        }
    }

    pub fn is_cancelled(self) -> bool {
        self == TicketStatus::Cancelled
    }

    /// `Ready`, `Served` or `Completed`.
    pub fn is_ready_or_later(self) -> bool {
        matches!(self.rank(), Some(rank) if rank >= 2)
    }

    /// `Served` or `Completed`.
    pub fn is_finished(self) -> bool {
        matches!(self, TicketStatus::Served | TicketStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::New => "NEW",
            TicketStatus::InQueue => "IN_QUEUE",
            TicketStatus::Ready => "READY",
            TicketStatus::Served => "SERVED",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate status of an order, always derived from its tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    InQueue,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Completed and cancelled orders drop out of live snapshots.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::InQueue => "IN_QUEUE",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
