//! # Test Doubles
//!
//! [`MockStore`] wraps a [`MemoryStore`] and lets a test script the outcome
//! of individual saves:
//!
//! ```ignore
//! let store = MockStore::new();
//! store.expect_save().return_err(StoreError::Unavailable("db down".into()));
//! store.expect_save().return_ok();
//! // first save fails, second goes through, later ones hit the memory store
//! ```
//!
//! [`MockTransport`] records every frame pushed to a viewer and can be told
//! to fail, stall, or drop the connection.

use crate::domain::{Order, OrderId, OrderNumber, OrderSnapshot, Ticket, TicketId, TicketNumber};
use crate::store::{MemoryStore, OrderStore, StoreError};
use crate::subscription::{DisconnectCallback, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// STORE
// =============================================================================

/// [`OrderStore`] with scripted save outcomes and optional save latency.
///
/// Queued expectations are consumed one per `save_order_and_tickets` call.
/// With the queue empty, saves pass straight through.
#[derive(Default)]
pub struct MockStore {
    inner: MemoryStore,
    saves: Arc<Mutex<VecDeque<Result<(), StoreError>>>>,
    save_delay: Mutex<Option<Duration>>,
    save_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next unscripted save.
    pub fn expect_save(&self) -> SaveExpectationBuilder {
        SaveExpectationBuilder {
            saves: self.saves.clone(),
        }
    }

    /// Every save sleeps this long before completing.
    pub fn set_save_delay(&self, delay: Duration) {
        *lock(&self.save_delay) = Some(delay);
    }

    /// Number of save attempts, successful or not.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Panics if scripted saves were never consumed.
    pub fn verify(&self) {
        let remaining = lock(&self.saves).len();
        if remaining != 0 {
            panic!("Not all save expectations were met. {remaining} remaining");
        }
    }
}

/// Builder for `save` expectations.
pub struct SaveExpectationBuilder {
    saves: Arc<Mutex<VecDeque<Result<(), StoreError>>>>,
}

impl SaveExpectationBuilder {
    /// The save succeeds and is written through.
    pub fn return_ok(self) {
        lock(&self.saves).push_back(Ok(()));
    }

    /// The save fails and nothing is written.
    pub fn return_err(self, error: StoreError) {
        lock(&self.saves).push_back(Err(error));
    }
}

#[async_trait]
impl OrderStore for MockStore {
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.load_order(id).await
    }

    async fn load_tickets_for_order(&self, id: OrderId) -> Result<Vec<Ticket>, StoreError> {
        self.inner.load_tickets_for_order(id).await
    }

    async fn save_order_and_tickets(
        &self,
        order: &Order,
        tickets: &[Ticket],
    ) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.save_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = lock(&self.saves).pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        self.inner.save_order_and_tickets(order, tickets).await
    }

    async fn next_order_number(&self) -> Result<OrderNumber, StoreError> {
        self.inner.next_order_number().await
    }

    async fn next_ticket_number(&self) -> Result<TicketNumber, StoreError> {
        self.inner.next_ticket_number().await
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        self.inner.find_ticket(id).await
    }

    async fn list_active_orders(&self) -> Result<Vec<OrderSnapshot>, StoreError> {
        self.inner.list_active_orders().await
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Recording push channel.
#[derive(Default)]
pub struct MockTransport {
    frames: Mutex<Vec<Vec<u8>>>,
    failure: Mutex<Option<TransportError>>,
    stalled: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
    disconnected: AtomicBool,
    on_disconnect: Mutex<Option<DisconnectCallback>>,
    sent: Notify,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every later send fails with `error`.
    pub fn fail_sends(&self, error: TransportError) {
        *lock(&self.failure) = Some(error);
    }

    /// Every later send hangs forever.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Drops the connection from the peer side and fires the disconnect callback.
    pub fn simulate_disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
        let callback = lock(&self.on_disconnect).take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// All recorded frames as text, keep-alives included.
    pub fn frames(&self) -> Vec<String> {
        lock(&self.frames)
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    /// Decoded `data:` frames, keep-alives skipped.
    pub fn messages(&self) -> Vec<Value> {
        self.frames()
            .iter()
            .filter_map(|f| f.lines().find_map(|line| line.strip_prefix("data: ")))
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }

    /// `id:` of every event frame, in arrival order.
    pub fn event_ids(&self) -> Vec<u64> {
        self.frames()
            .iter()
            .filter_map(|f| f.lines().find_map(|line| line.strip_prefix("id: ")))
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    /// Every later send first waits `delay`.
    pub fn set_send_delay(&self, delay: Duration) {
        *lock(&self.send_delay) = Some(delay);
    }

    /// `type` field of every decoded message, in arrival order.
    pub fn message_types(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_owned))
            .collect()
    }

    /// Waits until at least `count` decoded messages have arrived.
    pub async fn wait_for_messages(&self, count: usize) {
        loop {
            let notified = self.sent.notified();
            if self.messages().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let failure = lock(&self.failure).clone();
        if let Some(e) = failure {
            return Err(e);
        }
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *lock(&self.send_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.frames).push(frame.to_vec());
        self.sent.notify_waiters();
        Ok(())
    }

    fn on_disconnect(&self, callback: DisconnectCallback) {
        if self.disconnected.load(Ordering::SeqCst) {
            callback();
            return;
        }
        *lock(&self.on_disconnect) = Some(callback);
    }
}
