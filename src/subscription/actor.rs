//! Per-viewer delivery loop.
//!
//! One task per subscription drains that subscription's bus queue into its
//! transport, so a slow viewer only ever delays itself.

use super::{ManagerInner, SubscriptionState, TeardownReason, Transport, TransportError};
use crate::bus::{BusSubscription, DeliveryFailure};
use crate::config::SyncConfig;
use crate::events::{encode_event, ChangeEvent, KEEPALIVE_FRAME};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub(crate) struct DeliveryActor {
    state: Arc<SubscriptionState>,
    transport: Arc<dyn Transport>,
    events: mpsc::Receiver<Arc<ChangeEvent>>,
    dropped: Option<oneshot::Receiver<DeliveryFailure>>,
    manager: Weak<ManagerInner>,
    ping_interval: Duration,
    heartbeat_timeout: Duration,
    send_timeout: Duration,
}

impl DeliveryActor {
    pub(crate) fn new(
        state: Arc<SubscriptionState>,
        transport: Arc<dyn Transport>,
        sink: BusSubscription,
        manager: Weak<ManagerInner>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            state,
            transport,
            events: sink.events,
            dropped: Some(sink.dropped),
            manager,
            ping_interval: config.ping_interval,
            heartbeat_timeout: config.heartbeat_timeout,
            send_timeout: config.send_timeout,
        }
    }

    pub(crate) async fn run(mut self) {
        let id = self.state.id;
        info!(subscription_id = %id, scope = ?self.state.scope, "Delivery actor started");

        let cancel = self.state.cancel.clone();
        // A sink removed by teardown drops the sender without a reason;
        // only a bus-side drop resolves this future.
        let dropped = self.dropped.take();
        let dropped = async move {
            match dropped {
                Some(rx) => match rx.await {
                    Ok(failure) => failure,
                    Err(_) => std::future::pending().await,
                },
                None => std::future::pending().await,
            }
        };
        tokio::pin!(dropped);

        // `interval_at` panics on a zero period.
        let period = self.ping_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut queue_open = true;
        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break TeardownReason::Shutdown,
                failure = &mut dropped => break TeardownReason::from(failure),
                event = self.events.recv(), if queue_open => match event {
                    Some(event) => {
                        // A stuck send must not hide a teardown.
                        let delivered = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break TeardownReason::Shutdown,
                            failure = &mut dropped => break TeardownReason::from(failure),
                            result = self.deliver(&event) => result,
                        };
                        if let Err(e) = delivered {
                            warn!(subscription_id = %id, sequence = event.sequence, error = %e, "Delivery failed");
                            break TeardownReason::DeliveryFailure;
                        }
                    }
                    // Sink is gone; wait for the reason or the cancel.
                    None => queue_open = false,
                },
                _ = ticker.tick() => {
                    let silent = self.state.since_last_ack();
                    if silent >= self.heartbeat_timeout {
                        warn!(subscription_id = %id, silent_ms = silent.as_millis() as u64, "Heartbeat missed");
                        break TeardownReason::HeartbeatTimeout;
                    }
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break TeardownReason::Shutdown,
                        failure = &mut dropped => break TeardownReason::from(failure),
                        result = self.send(KEEPALIVE_FRAME) => result,
                    };
                    if let Err(e) = sent {
                        warn!(subscription_id = %id, error = %e, "Keep-alive failed");
                        break TeardownReason::DeliveryFailure;
                    }
                }
            }
        };

        // A cancel from a finished teardown makes this a no-op. A cancel from
        // the root token may land before the registry sweep saw this id.
        if let Some(manager) = self.manager.upgrade() {
            manager.teardown(id, reason);
        }
        info!(subscription_id = %id, "Delivery actor stopped");
    }

    async fn deliver(&self, event: &ChangeEvent) -> Result<(), TransportError> {
        let frame = match encode_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                // Nothing the viewer did; skip the event rather than drop the viewer.
                error!(subscription_id = %self.state.id, sequence = event.sequence, error = %e, "Encode failed");
                return Ok(());
            }
        };
        debug!(subscription_id = %self.state.id, sequence = event.sequence, kind = ?event.kind(), "Deliver");
        self.send(&frame).await
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        match tokio::time::timeout(self.send_timeout, self.transport.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}
