//! Wiring and shutdown of the synchronization core.

pub mod kitchen_system;
pub mod tracing;

pub use self::kitchen_system::KitchenSystem;
pub use self::tracing::setup_tracing;
