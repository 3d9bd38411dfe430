use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cart::CartLineSnapshot;
use crate::models::{Customer, Order, OrderItem};

/// Quick sale: the cart snapshot from the view layer's session store plus
/// the selected customer and payment method.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuickSaleRequest {
    pub customer_id: Uuid,
    pub payment_method: String,
    pub items: Vec<CartLineSnapshot>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenTabRequest {
    pub customer_id: Uuid,
    pub items: Vec<CartLineSnapshot>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CloseOrderRequest {
    pub payment_method: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuickAddRequest {
    pub product_id: Uuid,
}

/// Result of a confirmation (quick sale or tab close). The order is
/// committed even when some stock decrements are still pending; those
/// products are listed so the operator can reconcile.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub pending_settlement: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileOutcome {
    pub order_id: Uuid,
    pub settled: Vec<Uuid>,
    pub pending_settlement: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct OrderSummary {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub total: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderSummary>,
}

#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct OrderItemDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub settled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub customer: Customer,
    pub items: Vec<OrderItemDetail>,
}
