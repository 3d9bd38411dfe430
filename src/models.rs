use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Order status values as persisted. An order is created `Aberto` (a running
/// tab) or directly `Fechado` (quick sale) and transitions Aberto -> Fechado
/// exactly once.
pub const ORDER_OPEN: &str = "Aberto";
pub const ORDER_CLOSED: &str = "Fechado";

pub const CUSTOMER_NEW: &str = "New";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub customer_id: Uuid,
    pub total: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order. `unit_price` is captured at the time of sale and
/// never updated; `settled` records whether the line's stock decrement has
/// been applied to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub settled: bool,
    pub created_at: DateTime<Utc>,
}
