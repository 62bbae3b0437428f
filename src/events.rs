//! Change events and the subscriber wire format.
//!
//! A [`ChangeEvent`] is built once by the write coordinator, wrapped in an
//! `Arc`, and shared read-only by every subscriber it is fanned out to.
//!
//! On the wire each message is one UTF-8 text frame. Events lead with their
//! bus sequence; the connect-time snapshot has none:
//!
//! ```text
//! id: 42\ndata: {"type":"TICKET_UPDATED","payload":{...}}\n\n
//! data: {"type":"ORDERS_SNAPSHOT","payload":[...]}\n\n
//! ```

use crate::domain::{LineItem, OrderId, OrderSnapshot, TableRef, Ticket, TicketId, TicketStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Idle no-op frame (an SSE comment) that keeps intermediaries from closing
/// a quiet connection.
pub const KEEPALIVE_FRAME: &[u8] = b": keep-alive\n\n";

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    OrderCreated,
    TicketUpdated,
    OrderUpdated,
    ItemAdded,
}

/// Payload of a `TICKET_UPDATED` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub ticket: Ticket,
    pub previous: TicketStatus,
    /// Set when the change came through the operator override path.
    pub forced: bool,
    pub actor: String,
}

/// Payload of an `ITEM_ADDED` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub item: LineItem,
    pub ticket: Ticket,
}

/// Entity snapshot carried by an event. Serializes as `{ type, payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    OrderCreated(OrderSnapshot),
    TicketUpdated(TicketUpdate),
    OrderUpdated(OrderSnapshot),
    ItemAdded(ItemAdded),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::OrderCreated(_) => EventKind::OrderCreated,
            EventPayload::TicketUpdated(_) => EventKind::TicketUpdated,
            EventPayload::OrderUpdated(_) => EventKind::OrderUpdated,
            EventPayload::ItemAdded(_) => EventKind::ItemAdded,
        }
    }
}

/// Immutable notification describing one state change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Assigned by the bus at publish time; strictly increasing.
    pub sequence: u64,
    pub order_id: OrderId,
    pub ticket_id: Option<TicketId>,
    /// Table of the affected order, used for table-scoped subscriptions.
    pub table: Option<TableRef>,
    pub forced: bool,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl ChangeEvent {
    pub fn order_created(snapshot: OrderSnapshot) -> Self {
        let order_id = snapshot.order.id;
        let table = snapshot.order.table.clone();
        Self::new(order_id, table, None, false, EventPayload::OrderCreated(snapshot))
    }

    pub fn order_updated(snapshot: OrderSnapshot) -> Self {
        let order_id = snapshot.order.id;
        let table = snapshot.order.table.clone();
        Self::new(order_id, table, None, false, EventPayload::OrderUpdated(snapshot))
    }

    pub fn ticket_updated(update: TicketUpdate, table: Option<TableRef>) -> Self {
        let order_id = update.ticket.order_id;
        let ticket_id = Some(update.ticket.id);
        let forced = update.forced;
        Self::new(order_id, table, ticket_id, forced, EventPayload::TicketUpdated(update))
    }

    pub fn item_added(added: ItemAdded, table: Option<TableRef>) -> Self {
        let order_id = added.ticket.order_id;
        let ticket_id = Some(added.ticket.id);
        Self::new(order_id, table, ticket_id, false, EventPayload::ItemAdded(added))
    }

    fn new(
        order_id: OrderId,
        table: Option<TableRef>,
        ticket_id: Option<TicketId>,
        forced: bool,
        payload: EventPayload,
    ) -> Self {
        Self {
            sequence: 0,
            order_id,
            ticket_id,
            table,
            forced,
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Baseline frame sent once when a viewer connects.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
enum Baseline<'a> {
    OrdersSnapshot(&'a [OrderSnapshot]),
}

/// Encodes the `ORDERS_SNAPSHOT` frame for a fresh connection.
pub fn encode_snapshot(orders: &[OrderSnapshot]) -> Result<Vec<u8>, serde_json::Error> {
    to_frame(&Baseline::OrdersSnapshot(orders))
}

/// Encodes one event as `id: <sequence>\ndata: <json>\n\n`.
///
/// The `id:` line lets a consumer drop an event it has already applied.
pub fn encode_event(event: &ChangeEvent) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = format!("id: {}\n", event.sequence).into_bytes();
    frame.extend(to_frame(&event.payload)?);
    Ok(frame)
}

fn to_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_string(message)?;
    let mut frame = Vec::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(json.as_bytes());
    frame.extend_from_slice(b"\n\n");
    Ok(frame)
}
