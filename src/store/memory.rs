use super::{OrderStore, StoreError};
use crate::domain::{Order, OrderId, OrderNumber, OrderSnapshot, Ticket, TicketId, TicketNumber};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, OrderSnapshot>,
    ticket_index: HashMap<TicketId, OrderId>,
}

/// In-memory [`OrderStore`]. Saves replace the order row and its ticket set
/// under one write lock, so readers never see half a transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    order_seq: AtomicU64,
    ticket_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).map(|s| s.order.clone()))
    }

    async fn load_tickets_for_order(&self, id: OrderId) -> Result<Vec<Ticket>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .get(&id)
            .map(|s| s.tickets.clone())
            .unwrap_or_default())
    }

    async fn save_order_and_tickets(
        &self,
        order: &Order,
        tickets: &[Ticket],
    ) -> Result<(), StoreError> {
        if let Some(stray) = tickets.iter().find(|t| t.order_id != order.id) {
            return Err(StoreError::Rejected(format!(
                "ticket {} belongs to order {}, not {}",
                stray.id, stray.order_id, order.id
            )));
        }

        let mut tickets = tickets.to_vec();
        tickets.sort_by_key(|t| t.number);

        let mut tables = self.tables.write().await;
        if let Some(previous) = tables.orders.get(&order.id) {
            let stale: Vec<TicketId> = previous.tickets.iter().map(|t| t.id).collect();
            for id in stale {
                tables.ticket_index.remove(&id);
            }
        }
        for ticket in &tickets {
            tables.ticket_index.insert(ticket.id, order.id);
        }
        debug!(order_id = %order.id, tickets = tickets.len(), "Saved order");
        tables.orders.insert(
            order.id,
            OrderSnapshot {
                order: order.clone(),
                tickets,
            },
        );
        Ok(())
    }

    async fn next_order_number(&self) -> Result<OrderNumber, StoreError> {
        Ok(OrderNumber(self.order_seq.fetch_add(1, Ordering::Relaxed) + 1))
    }

    async fn next_ticket_number(&self) -> Result<TicketNumber, StoreError> {
        Ok(TicketNumber(self.ticket_seq.fetch_add(1, Ordering::Relaxed) + 1))
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let tables = self.tables.read().await;
        let found = tables
            .ticket_index
            .get(&id)
            .and_then(|order_id| tables.orders.get(order_id))
            .and_then(|s| s.tickets.iter().find(|t| t.id == id))
            .cloned();
        Ok(found)
    }

    async fn list_active_orders(&self) -> Result<Vec<OrderSnapshot>, StoreError> {
        let tables = self.tables.read().await;
        let mut active: Vec<OrderSnapshot> = tables
            .orders
            .values()
            .filter(|s| !s.order.status.is_terminal())
            .cloned()
            .collect();
        active.sort_by_key(|s| s.order.number);
        Ok(active)
    }
}
