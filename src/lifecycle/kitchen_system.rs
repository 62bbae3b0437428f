use crate::bus::EventBus;
use crate::config::SyncConfig;
use crate::coordinator::WriteCoordinator;
use crate::store::OrderStore;
use crate::subscription::SubscriptionManager;
use std::sync::Arc;
use tracing::info;

/// Runtime orchestrator for the synchronization core.
///
/// `KitchenSystem` is responsible for:
/// - **Dependency Wiring**: one [`EventBus`] shared by the writer side and
///   the subscriber side, both reading and writing through the same store
/// - **Lifecycle Management**: graceful shutdown of every live subscription
///
/// # Example
///
/// ```ignore
/// let system = KitchenSystem::new(Arc::new(MemoryStore::new()), SyncConfig::from_env());
///
/// let viewer = system.subscriptions.connect(SubscriptionScope::All, transport).await?;
/// let created = system.writer.create_order(new_order).await?;
///
/// system.shutdown().await;
/// ```
pub struct KitchenSystem {
    /// Entry point for all mutations.
    pub writer: WriteCoordinator,

    /// Viewer connection registry.
    pub subscriptions: SubscriptionManager,

    pub bus: Arc<EventBus>,

    pub config: SyncConfig,
}

impl KitchenSystem {
    /// Builds the bus, the writer and the subscription manager over `store`.
    ///
    /// Must be called inside a Tokio runtime; delivery actors are spawned as
    /// viewers connect.
    pub fn new(store: Arc<dyn OrderStore>, config: SyncConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.subscriber_buffer));
        let writer = WriteCoordinator::new(store.clone(), bus.clone(), config.lock_timeout);
        let subscriptions = SubscriptionManager::new(bus.clone(), store, config.clone());
        info!(?config, "Kitchen system started");
        Self {
            writer,
            subscriptions,
            bus,
            config,
        }
    }

    /// Tears down every subscription (reason `Shutdown`) and waits for their
    /// delivery actors to exit.
    ///
    /// Writers still in flight finish normally; their events reach no one.
    pub async fn shutdown(self) {
        info!("Shutting down kitchen system...");
        self.subscriptions.shutdown().await;
        info!(subscribers = self.bus.subscriber_count(), "Kitchen system shutdown complete.");
    }
}
