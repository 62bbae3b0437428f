//! # Write Coordinator
//!
//! The only entry point for writers. Every mutation follows the same path:
//!
//! ```text
//! lock(order) → load → validate → recompute → persist → publish → unlock
//! ```
//!
//! The lock is per order, not per ticket: aggregation reads the whole ticket
//! set, so two ticket updates on the same order must not interleave. Events
//! are published while the lock is still held, which keeps each viewer's
//! stream for one order in commit order.
//!
//! All edits happen on working copies loaded from the store. If the save
//! fails those copies are dropped, the caller gets
//! [`SyncError::PersistenceFailure`], and nothing is published.

mod lock;

use crate::aggregation::{order_status_for, recompute_order_total};
use crate::bus::EventBus;
use crate::domain::{
    Actor, LineItem, Money, NewItem, NewOrder, Order, OrderId, OrderSnapshot, OrderStatus, Ticket,
    TicketId,
};
use crate::error::{Missing, SyncError};
use crate::events::{ChangeEvent, ItemAdded, TicketUpdate};
use crate::state_machine::{apply_transition, TransitionRequest};
use crate::store::OrderStore;
use chrono::Utc;
use lock::LockTable;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What a writer call did.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    /// The order after the call.
    pub order: Order,
    /// The ticket that was created or updated, if any.
    pub ticket: Option<Ticket>,
    /// Aggregate status seen under the lock before the change.
    pub previous_status: OrderStatus,
    /// Total seen under the lock before the change.
    pub previous_total: Money,
    /// `false` for an idempotent re-application.
    pub changed: bool,
    /// Events published, in publish order.
    pub events: Vec<Arc<ChangeEvent>>,
}

pub struct WriteCoordinator {
    store: Arc<dyn OrderStore>,
    bus: Arc<EventBus>,
    locks: LockTable,
}

impl WriteCoordinator {
    pub fn new(store: Arc<dyn OrderStore>, bus: Arc<EventBus>, lock_timeout: Duration) -> Self {
        Self {
            store,
            bus,
            locks: LockTable::new(lock_timeout),
        }
    }

    /// Moves one ticket to a new status and re-derives its order.
    ///
    /// Publishes `TICKET_UPDATED` then `ORDER_UPDATED` on success. Requesting
    /// the ticket's current status succeeds without persisting or publishing.
    ///
    /// # Errors
    /// - [`SyncError::NotFound`] if the ticket or its order is gone
    /// - [`SyncError::IllegalTransition`] / [`SyncError::OverrideNotPermitted`]
    /// - [`SyncError::LockTimeout`] under contention
    /// - [`SyncError::PersistenceFailure`] if the store fails
    #[instrument(skip(self, actor), fields(actor = %actor.id, target = %request.target))]
    pub async fn mutate_ticket(
        &self,
        ticket_id: TicketId,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<MutationOutcome, SyncError> {
        let located = self
            .store
            .find_ticket(ticket_id)
            .await?
            .ok_or(SyncError::NotFound(Missing::Ticket(ticket_id)))?;
        let order_id = located.order_id;

        let _lock = self.locks.acquire(order_id).await?;
        let (mut order, mut tickets) = self.load(order_id).await?;
        let index = tickets
            .iter()
            .position(|t| t.id == ticket_id)
            .ok_or(SyncError::NotFound(Missing::Ticket(ticket_id)))?;

        let transition = apply_transition(tickets[index].status, request, actor).map_err(|e| {
            warn!(%order_id, %ticket_id, error = %e, "Transition rejected");
            SyncError::from(e)
        })?;

        let previous_status = order.status;
        let previous_total = order.total;

        if transition.is_noop() {
            debug!(%order_id, %ticket_id, status = %transition.to, "No-op transition");
            return Ok(MutationOutcome {
                ticket: Some(tickets[index].clone()),
                order,
                previous_status,
                previous_total,
                changed: false,
                events: Vec::new(),
            });
        }

        let now = Utc::now();
        tickets[index].status = transition.to;
        tickets[index].updated_at = now;
        rederive(&mut order, &tickets);
        order.updated_at = now;

        self.persist(&order, &tickets).await?;

        let ticket = tickets[index].clone();
        let ticket_event = self.bus.publish(ChangeEvent::ticket_updated(
            TicketUpdate {
                ticket: ticket.clone(),
                previous: transition.from,
                forced: transition.forced,
                actor: actor.id.clone(),
            },
            order.table.clone(),
        ));
        let order_event = self.bus.publish(ChangeEvent::order_updated(OrderSnapshot {
            order: order.clone(),
            tickets,
        }));

        info!(
            %order_id,
            %ticket_id,
            from = %transition.from,
            to = %transition.to,
            forced = transition.forced,
            order_status = %order.status,
            "Ticket updated"
        );
        Ok(MutationOutcome {
            order,
            ticket: Some(ticket),
            previous_status,
            previous_total,
            changed: true,
            events: vec![ticket_event, order_event],
        })
    }

    /// Adds a line item to an existing order on a fresh `NEW` ticket.
    ///
    /// Existing tickets are left untouched. Publishes `ITEM_ADDED` then
    /// `ORDER_UPDATED`.
    #[instrument(skip(self, item), fields(item = %item.name, quantity = item.quantity))]
    pub async fn add_item(
        &self,
        order_id: OrderId,
        item: NewItem,
    ) -> Result<MutationOutcome, SyncError> {
        item.validate().map_err(SyncError::InvalidItem)?;

        let _lock = self.locks.acquire(order_id).await?;
        let (mut order, mut tickets) = self.load(order_id).await?;
        let previous_status = order.status;
        let previous_total = order.total;

        let now = Utc::now();
        let number = self.store.next_ticket_number().await?;
        let ticket = Ticket::new(order_id, number, now);
        let line = LineItem::from_new(item, Some(ticket.id), now);
        order.items.push(line.clone());
        tickets.push(ticket.clone());
        rederive(&mut order, &tickets);
        order.updated_at = now;

        self.persist(&order, &tickets).await?;

        let item_event = self.bus.publish(ChangeEvent::item_added(
            ItemAdded {
                item: line,
                ticket: ticket.clone(),
            },
            order.table.clone(),
        ));
        let order_event = self.bus.publish(ChangeEvent::order_updated(OrderSnapshot {
            order: order.clone(),
            tickets,
        }));

        info!(%order_id, ticket = %ticket.number, total = %order.total, "Item added");
        Ok(MutationOutcome {
            order,
            ticket: Some(ticket),
            previous_status,
            previous_total,
            changed: true,
            events: vec![item_event, order_event],
        })
    }

    /// Creates an order with one `NEW` ticket covering all initial items.
    ///
    /// An order without items starts with no tickets. Publishes `ORDER_CREATED`.
    #[instrument(skip(self, new_order), fields(customer = %new_order.customer.0, items = new_order.items.len()))]
    pub async fn create_order(&self, new_order: NewOrder) -> Result<MutationOutcome, SyncError> {
        for item in &new_order.items {
            item.validate().map_err(SyncError::InvalidItem)?;
        }

        let now = Utc::now();
        let number = self.store.next_order_number().await?;
        let mut order = Order::new(number, new_order.customer, new_order.table, now);

        let mut tickets = Vec::new();
        if !new_order.items.is_empty() {
            let ticket_number = self.store.next_ticket_number().await?;
            tickets.push(Ticket::new(order.id, ticket_number, now));
        }
        let ticket_id = tickets.first().map(|t| t.id);
        order.items = new_order
            .items
            .into_iter()
            .map(|item| LineItem::from_new(item, ticket_id, now))
            .collect();
        rederive(&mut order, &tickets);

        self.persist(&order, &tickets).await?;

        let ticket = tickets.first().cloned();
        let event = self.bus.publish(ChangeEvent::order_created(OrderSnapshot {
            order: order.clone(),
            tickets,
        }));

        info!(order_id = %order.id, number = %order.number, total = %order.total, "Order created");
        Ok(MutationOutcome {
            order,
            ticket,
            previous_status: OrderStatus::New,
            previous_total: Money::ZERO,
            changed: true,
            events: vec![event],
        })
    }

    /// Orders with a writer currently holding or waiting on their lock.
    pub fn locked_orders(&self) -> usize {
        self.locks.len()
    }

    async fn load(&self, order_id: OrderId) -> Result<(Order, Vec<Ticket>), SyncError> {
        let order = self
            .store
            .load_order(order_id)
            .await?
            .ok_or(SyncError::NotFound(Missing::Order(order_id)))?;
        let tickets = self.store.load_tickets_for_order(order_id).await?;
        Ok((order, tickets))
    }

    async fn persist(&self, order: &Order, tickets: &[Ticket]) -> Result<(), SyncError> {
        self.store
            .save_order_and_tickets(order, tickets)
            .await
            .map_err(|e| {
                // The caller's working copies die with this error; the store
                // still holds the pre-call state.
                warn!(order_id = %order.id, error = %e, "Persist failed, rolled back");
                SyncError::PersistenceFailure(e)
            })
    }
}

/// Re-derives status and total from the full current sets.
fn rederive(order: &mut Order, tickets: &[Ticket]) {
    order.status = order_status_for(tickets);
    order.total = recompute_order_total(&order.items);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerRef, TicketStatus};
    use crate::mock::MockStore;
    use crate::store::StoreError;

    fn coordinator(store: Arc<dyn OrderStore>) -> (WriteCoordinator, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new(64));
        (
            WriteCoordinator::new(store, bus.clone(), Duration::from_secs(5)),
            bus,
        )
    }

    fn burger() -> NewItem {
        NewItem::new("Burger", Money(1250), 2)
    }

    #[tokio::test]
    async fn create_order_with_items_gets_one_ticket() {
        let (writer, _) = coordinator(Arc::new(MockStore::new()));
        let outcome = writer
            .create_order(NewOrder {
                customer: CustomerRef::from("c_1"),
                table: Some("T1".into()),
                items: vec![burger(), NewItem::new("Fries", Money(400), 1)],
            })
            .await
            .unwrap();

        assert_eq!(outcome.order.number.to_string(), "ORD-001");
        assert_eq!(outcome.order.total, Money(2900));
        assert_eq!(outcome.order.status, OrderStatus::InQueue);
        let ticket = outcome.ticket.unwrap();
        assert!(outcome.order.items.iter().all(|i| i.ticket_id == Some(ticket.id)));
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn empty_order_has_no_tickets() {
        let (writer, _) = coordinator(Arc::new(MockStore::new()));
        let outcome = writer
            .create_order(NewOrder {
                customer: CustomerRef::from("c_1"),
                table: None,
                items: vec![],
            })
            .await
            .unwrap();
        assert!(outcome.ticket.is_none());
        assert_eq!(outcome.order.status, OrderStatus::New);
        assert_eq!(outcome.order.total, Money::ZERO);
    }

    #[tokio::test]
    async fn invalid_item_is_rejected_before_any_write() {
        let store = Arc::new(MockStore::new());
        let (writer, _) = coordinator(store.clone());
        let err = writer
            .create_order(NewOrder {
                customer: CustomerRef::from("c_1"),
                table: None,
                items: vec![NewItem::new("Soup", Money(500), 0)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidItem(_)));
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (writer, _) = coordinator(Arc::new(MockStore::new()));
        let err = writer
            .mutate_ticket(
                TicketId::new(),
                TicketStatus::Ready.into(),
                &Actor::staff("cook"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(Missing::Ticket(_))));

        let err = writer.add_item(OrderId::new(), burger()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(Missing::Order(_))));
        assert_eq!(writer.locked_orders(), 0);
    }

    #[tokio::test]
    async fn illegal_transition_changes_nothing() {
        let store = Arc::new(MockStore::new());
        let (writer, bus) = coordinator(store.clone());
        let created = writer
            .create_order(NewOrder {
                customer: CustomerRef::from("c_1"),
                table: None,
                items: vec![burger()],
            })
            .await
            .unwrap();
        let ticket_id = created.ticket.unwrap().id;
        let cook = Actor::staff("cook");
        writer
            .mutate_ticket(ticket_id, TicketStatus::Ready.into(), &cook)
            .await
            .unwrap();

        let mut sub = bus.subscribe(crate::bus::SubscriptionScope::All);
        let saves = store.save_calls();
        let err = writer
            .mutate_ticket(ticket_id, TicketStatus::Cancelled.into(), &cook)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::IllegalTransition {
                from: TicketStatus::Ready,
                to: TicketStatus::Cancelled
            }
        );
        assert_eq!(store.save_calls(), saves);
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_save_publishes_nothing_and_keeps_state() {
        let store = Arc::new(MockStore::new());
        let (writer, bus) = coordinator(store.clone());
        let created = writer
            .create_order(NewOrder {
                customer: CustomerRef::from("c_1"),
                table: None,
                items: vec![burger()],
            })
            .await
            .unwrap();
        let order_id = created.order.id;
        let ticket_id = created.ticket.unwrap().id;

        let mut sub = bus.subscribe(crate::bus::SubscriptionScope::All);
        store
            .expect_save()
            .return_err(StoreError::Unavailable("db down".into()));
        let err = writer
            .mutate_ticket(ticket_id, TicketStatus::Ready.into(), &Actor::staff("cook"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PersistenceFailure(_)));
        assert!(err.is_retryable());
        assert!(sub.events.try_recv().is_err());

        let stored = store.load_snapshot(order_id).await.unwrap().unwrap();
        assert_eq!(stored.order, created.order);
        assert_eq!(stored.tickets[0].status, TicketStatus::New);
        store.verify();
    }
}
