//! # Observability
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter
//! filtered by `RUST_LOG`.
//!
//! ```bash
//! RUST_LOG=info cargo run     # lifecycle: orders created, tickets moved, viewers in/out
//! RUST_LOG=debug cargo run    # plus every publish, delivery and lock hand-off
//! RUST_LOG=kitchen_sync::subscription=debug cargo run
//! ```
//!
//! Log lines carry structured fields rather than prose, so they can be
//! filtered by `order_id`, `ticket_id` or `subscription_id`:
//!
//! ```text
//! INFO Subscriber connected subscription_id=sub_1 scope=All active=1
//! INFO create_order: Order created order_id=order_5f0c... number=ORD-001 total=25.00
//! INFO mutate_ticket: Ticket updated order_id=order_5f0c... from=NEW to=READY forced=false order_status=IN_QUEUE
//! WARN Subscription torn down subscription_id=sub_1 reason=heartbeat_timeout active=0
//! ```
//!
//! Writer calls run inside `#[instrument]` spans, so the compact format
//! shows them as a `mutate_ticket:` style prefix.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
