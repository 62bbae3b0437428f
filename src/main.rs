//! Demo: one order walked through the kitchen while a viewer watches.
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```

use async_trait::async_trait;
use kitchen_sync::bus::SubscriptionScope;
use kitchen_sync::domain::{Actor, Money, NewItem, NewOrder, TicketStatus};
use kitchen_sync::lifecycle::{setup_tracing, KitchenSystem};
use kitchen_sync::state_machine::TransitionRequest;
use kitchen_sync::store::MemoryStore;
use kitchen_sync::subscription::{DisconnectCallback, Transport, TransportError};
use kitchen_sync::SyncConfig;
use std::sync::Arc;
use tracing::{info, Instrument};

/// Prints every frame a viewer would receive.
struct LogTransport {
    name: &'static str,
}

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(frame);
        info!(viewer = self.name, frame = %text.trim_end(), "Push");
        Ok(())
    }

    fn on_disconnect(&self, _callback: DisconnectCallback) {}
}

#[tokio::main]
async fn main() -> Result<(), String> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    setup_tracing();

    let system = KitchenSystem::new(Arc::new(MemoryStore::new()), SyncConfig::from_env());

    let viewer = system
        .subscriptions
        .connect(SubscriptionScope::All, Arc::new(LogTransport { name: "pass" }))
        .await
        .map_err(|e| e.to_string())?;
    info!(subscription_id = %viewer.id, "Viewer connected");

    let span = tracing::info_span!("front_of_house");
    let created = async {
        system
            .writer
            .create_order(NewOrder {
                customer: "cust_42".into(),
                table: Some("T7".into()),
                items: vec![
                    NewItem::new("Margherita", Money::from_minor(1150), 1),
                    NewItem::new("Lemonade", Money::from_minor(350), 2),
                ],
            })
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;

    let order_id = created.order.id;
    info!(number = %created.order.number, total = %created.order.total, "Order placed");

    let extra = system
        .writer
        .add_item(order_id, NewItem::new("Tiramisu", Money::from_minor(700), 1))
        .await
        .map_err(|e| e.to_string())?;
    info!(total = %extra.order.total, status = %extra.order.status, "Dessert added");

    let cook = Actor::staff("cook_1");
    let mut tickets = Vec::new();
    tickets.extend(created.ticket.map(|t| t.id));
    tickets.extend(extra.ticket.map(|t| t.id));

    let span = tracing::info_span!("kitchen");
    async {
        for status in [TicketStatus::InQueue, TicketStatus::Ready] {
            for ticket_id in &tickets {
                let outcome = system
                    .writer
                    .mutate_ticket(*ticket_id, TransitionRequest::to(status), &cook)
                    .await
                    .map_err(|e| e.to_string())?;
                info!(order_status = %outcome.order.status, "Kitchen progress");
            }
        }
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    // A retry of the last call is a no-op.
    if let Some(ticket_id) = tickets.last() {
        let retry = system
            .writer
            .mutate_ticket(*ticket_id, TransitionRequest::to(TicketStatus::Ready), &cook)
            .await
            .map_err(|e| e.to_string())?;
        info!(changed = retry.changed, "Duplicate request");
    }

    system.subscriptions.acknowledge(viewer.id);
    // Let the delivery actor drain before shutting down.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    system.shutdown().await;
    Ok(())
}
