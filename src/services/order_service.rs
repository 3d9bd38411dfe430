//! Orchestrates turning a cart into persisted order rows while keeping
//! product stock consistent. The backend offers no cross-call transaction
//! to the workflow, so checkout runs as a saga: order and line rows commit
//! first, then each product's stock is settled through the ledger's
//! conditional decrement. A decrement that fails after the order committed
//! is logged and audited, never rolled back; `reconcile_order` re-runs
//! whatever is left pending.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    cart::Cart,
    db::DbPool,
    dto::orders::{
        CheckoutOutcome, OrderItemDetail, OrderList, OrderSummary, OrderWithItems,
        ReconcileOutcome,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthSeller,
    models::{Customer, ORDER_CLOSED, ORDER_OPEN, Order, OrderItem},
    response::{ApiResponse, PageMeta},
    routes::params::{OrderListQuery, SortOrder},
    services::inventory,
};

pub async fn list_orders(
    pool: &DbPool,
    seller: &AuthSeller,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let status = query.status.as_deref().filter(|s| !s.is_empty());
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let sql = format!(
        r#"
        SELECT o.id, o.customer_id, c.name AS customer_name,
               o.total, o.status, o.payment_method, o.created_at
        FROM orders o
        JOIN customers c ON c.id = o.customer_id
        WHERE o.establishment_id = $1
          AND ($2::text IS NULL OR o.status = $2)
        ORDER BY o.created_at {}
        LIMIT $3 OFFSET $4
        "#,
        sort_order.as_sql()
    );

    let items = sqlx::query_as::<_, OrderSummary>(&sql)
        .bind(seller.establishment_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE establishment_id = $1 AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(seller.establishment_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let meta = PageMeta::paged(page, limit, total.0);
    Ok(ApiResponse::paged("Orders", OrderList { items }, meta))
}

pub async fn get_order(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = fetch_order(pool, seller, id).await?;

    let customer = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE id = $1 AND establishment_id = $2",
    )
    .bind(order.customer_id)
    .bind(seller.establishment_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::MalformedRecord("order references a missing customer".into()))?;

    let items = sqlx::query_as::<_, OrderItemDetail>(
        r#"
        SELECT oi.id, oi.product_id, p.name AS product_name,
               oi.quantity, oi.unit_price, oi.settled
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = $1
        ORDER BY oi.created_at ASC
        "#,
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::new(
        "Order",
        OrderWithItems {
            order,
            customer,
            items,
        },
    ))
}

/// Quick sale: create and close an order in one workflow run.
///
/// Steps, each its own round trip: re-validate every cart line against
/// current stock (abort with zero writes on any shortfall), insert the
/// order as `Fechado`, insert one line per cart line at the captured unit
/// price, then settle stock per line. The cart is cleared only on success;
/// a validation failure leaves it intact so the seller can adjust.
pub async fn quick_sale(
    pool: &DbPool,
    seller: &AuthSeller,
    cart: &mut Cart,
    customer_id: Uuid,
    payment_method: &str,
) -> AppResult<ApiResponse<CheckoutOutcome>> {
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    ensure_customer(pool, seller, customer_id).await?;

    // The cart's stock snapshot may be stale; another seller may have sold
    // the last units since the product was added.
    for line in cart.lines() {
        let (name, stock) = fetch_name_and_stock(pool, seller, line.product_id).await?;
        if stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product: name,
                available: stock,
            });
        }
    }

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (id, establishment_id, customer_id, total, status, payment_method)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller.establishment_id)
    .bind(customer_id)
    .bind(cart.total())
    .bind(ORDER_CLOSED)
    .bind(payment_method)
    .fetch_one(pool)
    .await?;

    let mut items = Vec::with_capacity(cart.len());
    for line in cart.lines() {
        let item = insert_order_item(pool, order.id, line.product_id, line.quantity, line.unit_price)
            .await?;
        items.push(item);
    }

    let groups: Vec<(Uuid, i32)> = cart
        .lines()
        .iter()
        .map(|l| (l.product_id, l.quantity))
        .collect();
    let pending_settlement = settle_stock(pool, seller, order.id, &groups).await;
    for item in &mut items {
        item.settled = !pending_settlement.contains(&item.product_id);
    }

    cart.clear();

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "quick_sale",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "total": order.total,
            "pending_settlement": pending_settlement,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = if pending_settlement.is_empty() {
        "Sale completed"
    } else {
        "Sale recorded; stock settlement pending"
    };
    Ok(ApiResponse::new(
        message,
        CheckoutOutcome {
            order,
            items,
            pending_settlement,
        },
    ))
}

/// Open a running tab: persist the order as `Aberto` with its lines and do
/// not touch stock. Inventory is only affected once, when the tab closes.
pub async fn open_tab(
    pool: &DbPool,
    seller: &AuthSeller,
    cart: &mut Cart,
    customer_id: Uuid,
) -> AppResult<ApiResponse<CheckoutOutcome>> {
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    ensure_customer(pool, seller, customer_id).await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (id, establishment_id, customer_id, total, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller.establishment_id)
    .bind(customer_id)
    .bind(cart.total())
    .bind(ORDER_OPEN)
    .fetch_one(pool)
    .await?;

    let mut items = Vec::with_capacity(cart.len());
    for line in cart.lines() {
        let item = insert_order_item(pool, order.id, line.product_id, line.quantity, line.unit_price)
            .await?;
        items.push(item);
    }

    cart.clear();

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "tab_opened",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new(
        "Tab opened",
        CheckoutOutcome {
            order,
            items,
            pending_settlement: Vec::new(),
        },
    ))
}

/// Append one unit of a product to an open tab at the product's current
/// price. Presence check only (`stock > 0`); stock is not decremented
/// until the tab closes. Every quick-add is its own line row.
pub async fn quick_add_item(
    pool: &DbPool,
    seller: &AuthSeller,
    order_id: Uuid,
    product_id: Uuid,
) -> AppResult<ApiResponse<OrderItem>> {
    let order = fetch_order(pool, seller, order_id).await?;
    if order.status != ORDER_OPEN {
        return Err(AppError::BadRequest("Order is already closed".into()));
    }

    let product: Option<(String, Decimal, i32)> = sqlx::query_as(
        "SELECT name, price, stock FROM products WHERE id = $1 AND establishment_id = $2",
    )
    .bind(product_id)
    .bind(seller.establishment_id)
    .fetch_optional(pool)
    .await?;
    let (name, price, stock) = product.ok_or(AppError::NotFound)?;

    if stock <= 0 {
        return Err(AppError::InsufficientStock {
            product: name,
            available: 0,
        });
    }

    let item = insert_order_item(pool, order.id, product_id, 1, price).await?;

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "order_item_added",
        Some("order_items"),
        Some(serde_json::json!({ "order_id": order.id, "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new("Item added", item))
}

/// Close a running tab: re-validate the accumulated lines against current
/// stock (quantities summed per product), update the order row in place
/// with the recomputed total and payment method, then settle stock once
/// per product. No new order or line rows are created.
pub async fn close_order(
    pool: &DbPool,
    seller: &AuthSeller,
    order_id: Uuid,
    payment_method: &str,
) -> AppResult<ApiResponse<CheckoutOutcome>> {
    let order = fetch_order(pool, seller, order_id).await?;
    if order.status != ORDER_OPEN {
        return Err(AppError::BadRequest("Order is already closed".into()));
    }

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC",
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;
    if items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }

    // Quick-adds append one row each, so sum quantities per product and
    // decrement each product exactly once.
    let groups = group_quantities(&items);
    for (product_id, quantity) in &groups {
        let (name, stock) = fetch_name_and_stock(pool, seller, *product_id).await?;
        if stock < *quantity {
            return Err(AppError::InsufficientStock {
                product: name,
                available: stock,
            });
        }
    }

    let total: Decimal = items
        .iter()
        .map(|i| i.unit_price * Decimal::from(i.quantity))
        .sum::<Decimal>()
        .round_dp(2);

    let order = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = $3, total = $4, payment_method = $5, updated_at = now()
        WHERE id = $1 AND establishment_id = $2
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(seller.establishment_id)
    .bind(ORDER_CLOSED)
    .bind(total)
    .bind(payment_method)
    .fetch_one(pool)
    .await?;

    let pending_settlement = settle_stock(pool, seller, order.id, &groups).await;
    let mut items = items;
    for item in &mut items {
        item.settled = !pending_settlement.contains(&item.product_id);
    }

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "order_closed",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "total": order.total,
            "pending_settlement": pending_settlement,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = if pending_settlement.is_empty() {
        "Order closed"
    } else {
        "Order closed; stock settlement pending"
    };
    Ok(ApiResponse::new(
        message,
        CheckoutOutcome {
            order,
            items,
            pending_settlement,
        },
    ))
}

/// Operator hook: re-run the stock decrement for every line of a closed
/// order that is still unsettled. Idempotent; settled lines are never
/// decremented twice.
pub async fn reconcile_order(
    pool: &DbPool,
    seller: &AuthSeller,
    order_id: Uuid,
) -> AppResult<ApiResponse<ReconcileOutcome>> {
    let order = fetch_order(pool, seller, order_id).await?;
    if order.status != ORDER_CLOSED {
        return Err(AppError::BadRequest("Order is still open".into()));
    }

    let unsettled: Vec<(Uuid, i64)> = sqlx::query_as(
        r#"
        SELECT product_id, SUM(quantity)
        FROM order_items
        WHERE order_id = $1 AND NOT settled
        GROUP BY product_id
        "#,
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    // The per-row CHECK keeps quantities in i32 range, but their sum is
    // i64; refuse to settle a sum the ledger cannot represent.
    let mut groups: Vec<(Uuid, i32)> = Vec::with_capacity(unsettled.len());
    for (id, qty) in unsettled {
        let qty = i32::try_from(qty).map_err(|_| {
            AppError::MalformedRecord(format!(
                "unsettled quantity {qty} for product {id} exceeds the supported range"
            ))
        })?;
        groups.push((id, qty));
    }
    let pending_settlement = settle_stock(pool, seller, order.id, &groups).await;
    let settled: Vec<Uuid> = groups
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| !pending_settlement.contains(id))
        .collect();

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "order_reconciled",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "settled": settled,
            "pending_settlement": pending_settlement,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new(
        "Reconciled",
        ReconcileOutcome {
            order_id: order.id,
            settled,
            pending_settlement,
        },
    ))
}

async fn fetch_order(pool: &DbPool, seller: &AuthSeller, id: Uuid) -> AppResult<Order> {
    let order =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND establishment_id = $2")
            .bind(id)
            .bind(seller.establishment_id)
            .fetch_optional(pool)
            .await?;
    order.ok_or(AppError::NotFound)
}

async fn ensure_customer(pool: &DbPool, seller: &AuthSeller, id: Uuid) -> AppResult<()> {
    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM customers WHERE id = $1 AND establishment_id = $2")
            .bind(id)
            .bind(seller.establishment_id)
            .fetch_optional(pool)
            .await?;
    exists.map(|_| ()).ok_or(AppError::NotFound)
}

async fn fetch_name_and_stock(
    pool: &DbPool,
    seller: &AuthSeller,
    product_id: Uuid,
) -> AppResult<(String, i32)> {
    let row: Option<(String, i32)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = $1 AND establishment_id = $2")
            .bind(product_id)
            .bind(seller.establishment_id)
            .fetch_optional(pool)
            .await?;
    row.ok_or(AppError::NotFound)
}

async fn insert_order_item(
    pool: &DbPool,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
) -> AppResult<OrderItem> {
    let item = sqlx::query_as::<_, OrderItem>(
        r#"
        INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price)
    .fetch_one(pool)
    .await?;
    Ok(item)
}

fn group_quantities(items: &[OrderItem]) -> Vec<(Uuid, i32)> {
    let mut groups: Vec<(Uuid, i32)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => *qty += item.quantity,
            None => groups.push((item.product_id, item.quantity)),
        }
    }
    groups
}

/// Settlement step of the saga. Each product is an independent branch: a
/// failed decrement leaves its lines unsettled and the remaining products
/// are still attempted, so reconciliation has as little as possible left
/// to do. Returns the products whose decrement did not apply.
async fn settle_stock(
    pool: &DbPool,
    seller: &AuthSeller,
    order_id: Uuid,
    groups: &[(Uuid, i32)],
) -> Vec<Uuid> {
    let mut pending = Vec::new();
    for (product_id, quantity) in groups {
        match inventory::decrement(pool, seller.establishment_id, *product_id, *quantity).await {
            Ok(_) => {
                if let Err(err) = mark_settled(pool, order_id, *product_id).await {
                    // The decrement applied but the flag write failed; a
                    // re-run would decrement twice, so this needs eyes.
                    tracing::error!(
                        error = %err,
                        order_id = %order_id,
                        product_id = %product_id,
                        "stock decremented but settlement flag not recorded"
                    );
                    report_settlement_failure(pool, seller, order_id, *product_id, &err).await;
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    order_id = %order_id,
                    product_id = %product_id,
                    quantity,
                    "stock settlement failed; order remains committed"
                );
                report_settlement_failure(pool, seller, order_id, *product_id, &err).await;
                pending.push(*product_id);
            }
        }
    }
    pending
}

async fn mark_settled(pool: &DbPool, order_id: Uuid, product_id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE order_items SET settled = TRUE WHERE order_id = $1 AND product_id = $2 AND NOT settled",
    )
    .bind(order_id)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn report_settlement_failure(
    pool: &DbPool,
    seller: &AuthSeller,
    order_id: Uuid,
    product_id: Uuid,
    err: &AppError,
) {
    if let Err(audit_err) = log_audit(
        pool,
        Some(seller.seller_id),
        "stock_settlement_failed",
        Some("order_items"),
        Some(serde_json::json!({
            "order_id": order_id,
            "product_id": product_id,
            "error": err.to_string(),
        })),
    )
    .await
    {
        tracing::warn!(error = %audit_err, "audit log failed");
    }
}
