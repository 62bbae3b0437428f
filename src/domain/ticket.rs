use crate::domain::{OrderId, TicketId, TicketNumber, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One kitchen-order-ticket (KOT).
///
/// A ticket belongs to exactly one order for its whole life. Its status only
/// moves through [`crate::state_machine::apply_transition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub order_id: OrderId,
    pub number: TicketNumber,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Creates a fresh ticket in `NEW`.
    pub fn new(order_id: OrderId, number: TicketNumber, now: DateTime<Utc>) -> Self {
        Self {
            id: TicketId::new(),
            order_id,
            number,
            status: TicketStatus::New,
            created_at: now,
            updated_at: now,
        }
    }
}
