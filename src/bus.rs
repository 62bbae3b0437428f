//! # Event Bus
//!
//! In-process publish/subscribe registry. Every subscription owns a bounded
//! `mpsc` queue; `publish` pushes into each matching queue with `try_send`
//! and never waits, so a stalled consumer cannot hold up the writer or any
//! other subscriber.
//!
//! ```text
//! WriteCoordinator ──publish──▶ EventBus
//!                                  ├── try_send ──▶ sub_1 queue ──▶ delivery actor ──▶ transport
//!                                  ├── try_send ──▶ sub_2 queue ──▶ delivery actor ──▶ transport
//!                                  └── (full/closed) ──▶ sink removed, owner told why
//! ```
//!
//! A queue that is full or closed at publish time costs that subscriber its
//! sink. The bus removes it on the spot and reports the reason through the
//! subscription's one-shot `dropped` channel; the subscription manager does
//! the rest of the teardown.

use crate::domain::{OrderId, TableRef};
use crate::events::ChangeEvent;
use dashmap::DashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Identifier of a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub_{}", self.0)
    }
}

/// Which events a subscription wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionScope {
    /// Every order.
    All,
    /// A single order.
    Order(OrderId),
    /// Every order seated at one table.
    Table(TableRef),
}

impl SubscriptionScope {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            SubscriptionScope::All => true,
            SubscriptionScope::Order(order_id) => event.order_id == *order_id,
            SubscriptionScope::Table(table) => event.table.as_ref() == Some(table),
        }
    }
}

/// Why the bus gave up on a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The subscriber's queue was full.
    Backpressure,
    /// The subscriber's queue had no receiver left.
    Closed,
}

impl Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryFailure::Backpressure => f.write_str("backpressure"),
            DeliveryFailure::Closed => f.write_str("closed"),
        }
    }
}

struct Sink {
    scope: SubscriptionScope,
    sender: mpsc::Sender<Arc<ChangeEvent>>,
    dropped: oneshot::Sender<DeliveryFailure>,
}

/// Receiving half handed to the subscriber on [`EventBus::subscribe`].
#[derive(Debug)]
pub struct BusSubscription {
    pub id: SubscriptionId,
    pub scope: SubscriptionScope,
    pub events: mpsc::Receiver<Arc<ChangeEvent>>,
    /// Fires once if the bus drops this sink on its own.
    pub dropped: oneshot::Receiver<DeliveryFailure>,
}

/// Publish/subscribe registry for [`ChangeEvent`]s.
pub struct EventBus {
    sinks: DashMap<SubscriptionId, Sink>,
    next_id: AtomicU64,
    sequence: AtomicU64,
    buffer_size: usize,
}

impl EventBus {
    /// Creates a bus whose subscribers each buffer up to `buffer_size` events.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            sinks: DashMap::new(),
            next_id: AtomicU64::new(1),
            sequence: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Registers a new sink. Events published before this call are never
    /// delivered to it.
    pub fn subscribe(&self, scope: SubscriptionScope) -> BusSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, events) = mpsc::channel(self.buffer_size);
        let (dropped_tx, dropped) = oneshot::channel();
        self.sinks.insert(
            id,
            Sink {
                scope: scope.clone(),
                sender,
                dropped: dropped_tx,
            },
        );
        debug!(subscription_id = %id, ?scope, size = self.sinks.len(), "Subscribed");
        BusSubscription {
            id,
            scope,
            events,
            dropped,
        }
    }

    /// Removes a sink. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.sinks.remove(&id).is_some();
        if removed {
            debug!(subscription_id = %id, size = self.sinks.len(), "Unsubscribed");
        }
        removed
    }

    /// Stamps the event with the next sequence number and hands it to every
    /// matching subscriber.
    ///
    /// Never blocks and never fails; per-subscriber problems are contained
    /// to that subscriber.
    pub fn publish(&self, mut event: ChangeEvent) -> Arc<ChangeEvent> {
        event.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let event = Arc::new(event);

        let mut failed = Vec::new();
        let mut delivered = 0usize;
        for entry in self.sinks.iter() {
            if !entry.scope.matches(&event) {
                continue;
            }
            match entry.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    failed.push((*entry.key(), DeliveryFailure::Backpressure))
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    failed.push((*entry.key(), DeliveryFailure::Closed))
                }
            }
        }

        for (id, reason) in failed {
            if let Some((_, sink)) = self.sinks.remove(&id) {
                warn!(subscription_id = %id, %reason, "Subscriber delivery failure, dropping sink");
                let _ = sink.dropped.send(reason);
            }
        }

        debug!(
            sequence = event.sequence,
            kind = ?event.kind(),
            order_id = %event.order_id,
            delivered,
            "Published"
        );
        event
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.sinks.contains_key(&id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SUBSCRIBER_BUFFER)
    }
}
