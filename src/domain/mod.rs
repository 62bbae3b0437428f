//! Pure data structures for orders and kitchen tickets.
//!
//! Nothing here performs I/O. Canonical copies of these values live in the
//! durable store; the synchronization core only ever holds working copies.

pub mod actor;
pub mod ids;
pub mod money;
pub mod order;
pub mod status;
pub mod ticket;

pub use actor::*;
pub use ids::*;
pub use money::Money;
pub use order::*;
pub use status::*;
pub use ticket::*;
