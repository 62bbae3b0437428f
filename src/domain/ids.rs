//! Type-safe identifiers.
//!
//! Orders, tickets and line items are keyed by random UUIDs. The human-facing
//! order and ticket numbers are separate, monotonically assigned by the store.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", $prefix, self.0.simple())
            }
        }
    };
}

uuid_id!(
    /// Identifier of an [`Order`](crate::domain::Order).
    OrderId,
    "order"
);
uuid_id!(
    /// Identifier of a kitchen [`Ticket`](crate::domain::Ticket).
    TicketId,
    "ticket"
);
uuid_id!(
    /// Identifier of a [`LineItem`](crate::domain::LineItem).
    LineItemId,
    "item"
);

/// Human-readable order number, unique per restaurant.
///
/// Displays as `ORD-001`; the padding grows past three digits as needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub u64);

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ORD-{:03}", self.0)
    }
}

/// Per-restaurant ticket sequence number. Display/debug only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(pub u64);

impl Display for TicketNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KOT-{:03}", self.0)
    }
}

/// Opaque reference to the customer who placed an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRef(pub String);

impl From<&str> for CustomerRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CustomerRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Dining table reference. Absent for take-away and delivery orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRef(pub String);

impl From<&str> for TableRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TableRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
