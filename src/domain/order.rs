use crate::domain::money::{MAX_QUANTITY, MAX_UNIT_PRICE};
use crate::domain::{
    CustomerRef, LineItemId, Money, OrderId, OrderNumber, OrderStatus, TableRef, Ticket, TicketId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer order.
///
/// `status` and `total` are derived fields. Writers never set them; the
/// [`aggregation`](crate::aggregation) functions recompute both from the
/// current tickets and line items on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: OrderNumber,
    pub customer: CustomerRef,
    pub table: Option<TableRef>,
    pub status: OrderStatus,
    pub total: Money,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty order in `NEW` with a zero total.
    ///
    /// # Arguments
    /// * `number` - Human-readable number handed out by the store
    /// * `customer` - Who placed the order
    /// * `table` - Dining table, `None` for take-away or delivery
    /// * `now` - Creation timestamp
    pub fn new(
        number: OrderNumber,
        customer: CustomerRef,
        table: Option<TableRef>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            number,
            customer,
            table,
            status: OrderStatus::New,
            total: Money::ZERO,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One priced line on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// Ticket the kitchen prepares this item on, if any.
    pub ticket_id: Option<TicketId>,
    pub added_at: DateTime<Utc>,
}

impl LineItem {
    pub fn from_new(item: NewItem, ticket_id: Option<TicketId>, now: DateTime<Utc>) -> Self {
        Self {
            id: LineItemId::new(),
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            ticket_id,
            added_at: now,
        }
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Payload for adding an item to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl NewItem {
    pub fn new(name: impl Into<String>, unit_price: Money, quantity: u32) -> Self {
        Self {
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Rejects items the total computation cannot carry.
    ///
    /// The bounds keep `unit_price * quantity` and any realistic sum of
    /// subtotals well inside `i64`.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("item name must not be empty".to_string());
        }
        if self.unit_price < Money::ZERO || self.unit_price > MAX_UNIT_PRICE {
            return Err(format!(
                "unit price must be between 0.00 and {}, got {}",
                MAX_UNIT_PRICE, self.unit_price
            ));
        }
        if self.quantity == 0 || self.quantity > MAX_QUANTITY {
            return Err(format!(
                "quantity must be between 1 and {}, got {}",
                MAX_QUANTITY, self.quantity
            ));
        }
        Ok(())
    }
}

/// Payload for creating a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: CustomerRef,
    pub table: Option<TableRef>,
    pub items: Vec<NewItem>,
}

/// An order together with its current tickets.
///
/// This is the entity snapshot carried by order-level events and by the
/// initial `ORDERS_SNAPSHOT` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    #[serde(flatten)]
    pub order: Order,
    pub tickets: Vec<Ticket>,
}
