//! # Durable Store Boundary
//!
//! The synchronization core never owns canonical order state. It reads and
//! writes through [`OrderStore`], treating every call as a remote operation
//! that may fail, with no retry of its own.
//!
//! [`MemoryStore`] is the in-process implementation used by the demo binary
//! and the tests.

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use crate::domain::{Order, OrderId, OrderNumber, OrderSnapshot, Ticket, TicketId, TicketNumber};
use async_trait::async_trait;

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Tickets of one order, in ticket-number order.
    async fn load_tickets_for_order(&self, id: OrderId) -> Result<Vec<Ticket>, StoreError>;

    /// Writes the order and its complete ticket set in one transaction.
    ///
    /// Either everything is stored or nothing is.
    async fn save_order_and_tickets(&self, order: &Order, tickets: &[Ticket])
        -> Result<(), StoreError>;

    async fn next_order_number(&self) -> Result<OrderNumber, StoreError>;

    async fn next_ticket_number(&self) -> Result<TicketNumber, StoreError>;

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError>;

    /// Orders that are neither completed nor cancelled, with their tickets.
    async fn list_active_orders(&self) -> Result<Vec<OrderSnapshot>, StoreError>;

    /// Loads an order together with its tickets.
    async fn load_snapshot(&self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        let Some(order) = self.load_order(id).await? else {
            return Ok(None);
        };
        let tickets = self.load_tickets_for_order(id).await?;
        Ok(Some(OrderSnapshot { order, tickets }))
    }
}
