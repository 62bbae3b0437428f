//! # Kitchen Sync
//!
//! > **Order and kitchen-ticket synchronization for a restaurant backend.**
//!
//! Keeps every order's aggregate status and total consistent with its
//! tickets and line items while many writers mutate them concurrently, and
//! streams each committed change to every connected viewer.
//!
//! ## Data Flow
//!
//! ```text
//! writer ──▶ WriteCoordinator ──lock(order)──▶ state_machine ──▶ aggregation
//!                   │                                                │
//!                   ◀────────────────── persist (OrderStore) ◀───────┘
//!                   │
//!                   └──publish──▶ EventBus ──▶ per-viewer DeliveryActor ──▶ Transport
//! ```
//!
//! ## Module Tour
//!
//! ### 1. Pure logic ([`domain`], [`state_machine`], [`aggregation`])
//! Closed enums for ticket and order status, a transition table instead of
//! string comparisons, and the one function allowed to derive an order's
//! status from its tickets.
//!
//! ### 2. Fan-out ([`events`], [`bus`], [`subscription`])
//! Events are built once, shared via `Arc`, and pushed into a bounded queue
//! per viewer. A slow or dead viewer loses its own subscription and nothing
//! else; it reconnects and receives a fresh `ORDERS_SNAPSHOT`.
//!
//! ### 3. The write path ([`coordinator`], [`store`])
//! Per-order locks with a bounded wait, working copies that are discarded on
//! a failed save, and publishing strictly after persistence.
//!
//! ### 4. The orchestrator ([`lifecycle`])
//! [`KitchenSystem`](lifecycle::KitchenSystem) wires everything together and
//! shuts subscriptions down gracefully.
//!
//! ### 5. Testing ([`mock`])
//! `MockStore` scripts save failures and latency; `MockTransport` records
//! what a viewer would have seen.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=info cargo run
//! cargo test
//! ```

pub mod aggregation;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod mock;
pub mod state_machine;
pub mod store;
pub mod subscription;

pub use config::SyncConfig;
pub use error::SyncError;
