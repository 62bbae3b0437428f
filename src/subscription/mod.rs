//! # Subscription Manager
//!
//! Owns the lifecycle of every live viewer connection:
//!
//! 1. **Connect**: register a bus sink, push one `ORDERS_SNAPSHOT` frame for
//!    the requested scope, then hand the sink to a per-viewer
//!    [`DeliveryActor`](actor::DeliveryActor).
//! 2. **Heartbeat**: the actor sends a keep-alive frame every
//!    `ping_interval`; the outer layer reports the viewer's ACKs through
//!    [`SubscriptionManager::acknowledge`]. A viewer silent for
//!    `heartbeat_timeout` is reaped.
//! 3. **Teardown**: clean disconnect, missed heartbeat, failed delivery,
//!    bus backpressure or shutdown all funnel into one teardown path guarded
//!    by the subscription's liveness flag, so it runs exactly once no matter
//!    how many of those fire together.
//!
//! The sink is registered before the snapshot is read, so a viewer may see
//! an event that is already reflected in its snapshot. Every event frame
//! carries its bus `sequence` as the SSE `id:` line and the full state of
//! what it touched, so replaying one is harmless.

pub mod actor;
pub mod error;
pub mod transport;

pub use error::{ConnectError, TransportError};
pub use transport::{DisconnectCallback, Transport};

use crate::bus::{EventBus, SubscriptionId, SubscriptionScope};
use crate::config::SyncConfig;
use crate::domain::OrderSnapshot;
use crate::events::encode_snapshot;
use crate::store::{OrderStore, StoreError};
use actor::DeliveryActor;
use dashmap::DashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Why a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The transport reported the peer gone, or the outer layer disconnected it.
    ClientDisconnect,
    /// No heartbeat ACK within the timeout window.
    HeartbeatTimeout,
    /// A frame could not be written to the transport.
    DeliveryFailure,
    /// The viewer's event buffer overflowed.
    Backpressure,
    Shutdown,
}

impl Display for TeardownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TeardownReason::ClientDisconnect => "client_disconnect",
            TeardownReason::HeartbeatTimeout => "heartbeat_timeout",
            TeardownReason::DeliveryFailure => "delivery_failure",
            TeardownReason::Backpressure => "backpressure",
            TeardownReason::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

impl From<crate::bus::DeliveryFailure> for TeardownReason {
    fn from(failure: crate::bus::DeliveryFailure) -> Self {
        match failure {
            crate::bus::DeliveryFailure::Backpressure => TeardownReason::Backpressure,
            crate::bus::DeliveryFailure::Closed => TeardownReason::DeliveryFailure,
        }
    }
}

const LIVE: u8 = 0;
const CLOSED: u8 = 1;

/// Per-connection bookkeeping shared by the manager and the delivery actor.
pub(crate) struct SubscriptionState {
    pub(crate) id: SubscriptionId,
    pub(crate) scope: SubscriptionScope,
    liveness: AtomicU8,
    connected_at: Instant,
    /// Milliseconds after `connected_at` of the latest ACK.
    last_ack_ms: AtomicU64,
    pub(crate) cancel: CancellationToken,
    closed: watch::Sender<Option<TeardownReason>>,
}

impl SubscriptionState {
    fn new(id: SubscriptionId, scope: SubscriptionScope, cancel: CancellationToken) -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            id,
            scope,
            liveness: AtomicU8::new(LIVE),
            connected_at: Instant::now(),
            last_ack_ms: AtomicU64::new(0),
            cancel,
            closed,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.liveness.load(Ordering::Acquire) == LIVE
    }

    /// Flips `LIVE → CLOSED`. Only the first caller gets `true`.
    fn close(&self) -> bool {
        self.liveness
            .compare_exchange(LIVE, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn record_ack(&self) {
        let ms = self.connected_at.elapsed().as_millis() as u64;
        self.last_ack_ms.fetch_max(ms, Ordering::AcqRel);
    }

    pub(crate) fn since_last_ack(&self) -> Duration {
        let last = Duration::from_millis(self.last_ack_ms.load(Ordering::Acquire));
        self.connected_at.elapsed().saturating_sub(last)
    }
}

/// Caller-side view of a live subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub scope: SubscriptionScope,
    closed: watch::Receiver<Option<TeardownReason>>,
}

impl SubscriptionHandle {
    /// Teardown reason, if the subscription has already ended.
    pub fn reason(&self) -> Option<TeardownReason> {
        *self.closed.borrow()
    }

    /// Resolves once the subscription is torn down.
    pub async fn closed(&mut self) -> TeardownReason {
        loop {
            if let Some(reason) = *self.closed.borrow_and_update() {
                return reason;
            }
            if self.closed.changed().await.is_err() {
                return self.reason().unwrap_or(TeardownReason::Shutdown);
            }
        }
    }
}

pub(crate) struct ManagerInner {
    bus: Arc<EventBus>,
    store: Arc<dyn OrderStore>,
    config: SyncConfig,
    registry: DashMap<SubscriptionId, Arc<SubscriptionState>>,
    tasks: DashMap<SubscriptionId, JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl ManagerInner {
    /// The single teardown path. Returns `true` only for the call that
    /// actually ended the subscription.
    pub(crate) fn teardown(&self, id: SubscriptionId, reason: TeardownReason) -> bool {
        let Some(state) = self.registry.get(&id).map(|entry| entry.value().clone()) else {
            return false;
        };
        if !state.close() {
            debug!(subscription_id = %id, %reason, "Teardown already done");
            return false;
        }

        self.registry.remove(&id);
        state.cancel.cancel();
        self.bus.unsubscribe(id);
        self.tasks.remove(&id);
        state.closed.send_replace(Some(reason));

        match reason {
            TeardownReason::ClientDisconnect | TeardownReason::Shutdown => {
                info!(subscription_id = %id, %reason, active = self.registry.len(), "Subscription closed")
            }
            _ => {
                warn!(subscription_id = %id, %reason, active = self.registry.len(), "Subscription torn down")
            }
        }
        true
    }
}

/// Registry of live viewer connections. Cheap to clone.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<ManagerInner>,
}

impl SubscriptionManager {
    pub fn new(bus: Arc<EventBus>, store: Arc<dyn OrderStore>, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                bus,
                store,
                config,
                registry: DashMap::new(),
                tasks: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Registers a viewer and pushes its baseline snapshot.
    ///
    /// The `ORDERS_SNAPSHOT` frame is sent before this returns and before any
    /// incremental event can reach the transport.
    #[instrument(skip(self, transport))]
    pub async fn connect(
        &self,
        scope: SubscriptionScope,
        transport: Arc<dyn Transport>,
    ) -> Result<SubscriptionHandle, ConnectError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ConnectError::ShuttingDown);
        }

        let sink = self.inner.bus.subscribe(scope.clone());
        let id = sink.id;

        if let Err(e) = self.push_snapshot(&scope, transport.as_ref()).await {
            warn!(subscription_id = %id, error = %e, "Connect failed");
            self.inner.bus.unsubscribe(id);
            return Err(e);
        }

        let state = Arc::new(SubscriptionState::new(
            id,
            scope.clone(),
            self.inner.shutdown.child_token(),
        ));
        let closed = state.closed.subscribe();
        self.inner.registry.insert(id, state.clone());

        // `shutdown` may have swept the registry while the snapshot was in flight.
        if self.inner.shutdown.is_cancelled() {
            self.inner.teardown(id, TeardownReason::Shutdown);
            debug!(subscription_id = %id, "Connect raced shutdown");
            return Err(ConnectError::ShuttingDown);
        }

        let actor = DeliveryActor::new(
            state.clone(),
            transport.clone(),
            sink,
            Arc::downgrade(&self.inner),
            &self.inner.config,
        );
        let handle = tokio::spawn(actor.run());
        self.inner.tasks.insert(id, handle);
        if !state.is_live() {
            self.inner.tasks.remove(&id);
        }

        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        transport.on_disconnect(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.teardown(id, TeardownReason::ClientDisconnect);
            }
        }));

        info!(subscription_id = %id, ?scope, active = self.inner.registry.len(), "Subscriber connected");
        Ok(SubscriptionHandle { id, scope, closed })
    }

    async fn push_snapshot(
        &self,
        scope: &SubscriptionScope,
        transport: &dyn Transport,
    ) -> Result<(), ConnectError> {
        let orders = self.load_scope(scope).await?;
        let frame = encode_snapshot(&orders).map_err(|e| ConnectError::Encode(e.to_string()))?;
        match tokio::time::timeout(self.inner.config.send_timeout, transport.send(&frame)).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout.into()),
        }
        debug!(orders = orders.len(), "Snapshot sent");
        Ok(())
    }

    async fn load_scope(&self, scope: &SubscriptionScope) -> Result<Vec<OrderSnapshot>, StoreError> {
        match scope {
            SubscriptionScope::All => self.inner.store.list_active_orders().await,
            SubscriptionScope::Table(table) => {
                let mut orders = self.inner.store.list_active_orders().await?;
                orders.retain(|s| s.order.table.as_ref() == Some(table));
                Ok(orders)
            }
            SubscriptionScope::Order(order_id) => Ok(self
                .inner
                .store
                .load_snapshot(*order_id)
                .await?
                .into_iter()
                .collect()),
        }
    }

    /// Records a heartbeat ACK. Returns `false` for unknown subscriptions.
    pub fn acknowledge(&self, id: SubscriptionId) -> bool {
        match self.inner.registry.get(&id) {
            Some(state) => {
                state.record_ack();
                true
            }
            None => false,
        }
    }

    /// Explicit disconnect. Returns `false` if the subscription was already gone.
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        self.inner.teardown(id, TeardownReason::ClientDisconnect)
    }

    pub fn active_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.inner.registry.contains_key(&id)
    }

    /// Tears down every subscription and waits for the delivery actors to exit.
    /// Later `connect` calls fail with [`ConnectError::ShuttingDown`].
    pub async fn shutdown(&self) {
        info!(active = self.inner.registry.len(), "Shutting down subscriptions...");
        self.inner.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let ids: Vec<SubscriptionId> = self.inner.tasks.iter().map(|e| *e.key()).collect();
            ids.into_iter()
                .filter_map(|id| self.inner.tasks.remove(&id).map(|(_, h)| h))
                .collect()
        };
        let ids: Vec<SubscriptionId> = self.inner.registry.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.inner.teardown(id, TeardownReason::Shutdown);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Delivery actor failed");
            }
        }
        info!("Subscriptions shut down");
    }
}
