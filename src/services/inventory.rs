//! Inventory ledger: per-product available stock, consumed by the order
//! workflow. Product stock is the only shared mutable resource in the
//! system, so the decrement is a single guarded statement rather than a
//! read-then-write pair.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
};

pub async fn get_stock(pool: &DbPool, establishment_id: Uuid, product_id: Uuid) -> AppResult<i32> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT stock FROM products WHERE id = $1 AND establishment_id = $2")
            .bind(product_id)
            .bind(establishment_id)
            .fetch_optional(pool)
            .await?;

    row.map(|(stock,)| stock).ok_or(AppError::NotFound)
}

/// Conditionally decrement a product's stock. The `stock >= quantity` guard
/// makes check and write one atomic statement, so two racing sellers can
/// never drive stock negative; the loser sees `InsufficientStock`. Returns
/// the remaining stock.
pub async fn decrement(
    pool: &DbPool,
    establishment_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<i32> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(format!(
            "decrement quantity must be positive, got {quantity}"
        )));
    }

    let updated: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE products
        SET stock = stock - $3
        WHERE id = $1 AND establishment_id = $2 AND stock >= $3
        RETURNING stock
        "#,
    )
    .bind(product_id)
    .bind(establishment_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?;

    if let Some((stock,)) = updated {
        return Ok(stock);
    }

    // Guard did not match: either the product is gone or stock is short.
    let current: Option<(String, i32)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = $1 AND establishment_id = $2")
            .bind(product_id)
            .bind(establishment_id)
            .fetch_optional(pool)
            .await?;

    match current {
        Some((name, available)) => Err(AppError::InsufficientStock {
            product: name,
            available,
        }),
        None => Err(AppError::NotFound),
    }
}

/// Admin restock. Additive counterpart of `decrement`; returns the new
/// stock level.
pub async fn restock(
    pool: &DbPool,
    establishment_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<i32> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(format!(
            "restock quantity must be positive, got {quantity}"
        )));
    }

    let updated: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE products
        SET stock = stock + $3
        WHERE id = $1 AND establishment_id = $2
        RETURNING stock
        "#,
    )
    .bind(product_id)
    .bind(establishment_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?;

    updated.map(|(stock,)| stock).ok_or(AppError::NotFound)
}
