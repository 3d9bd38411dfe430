use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthSeller, ensure_admin},
    models::Product,
    response::{ApiResponse, PageMeta},
    routes::params::ProductQuery,
    services::inventory,
};

pub async fn list_products(
    pool: &DbPool,
    seller: &AuthSeller,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let pattern = query
        .q
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let items = sqlx::query_as::<_, Product>(
        r#"
        SELECT * FROM products
        WHERE establishment_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR category ILIKE $2)
        ORDER BY name ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(seller.establishment_id)
    .bind(pattern.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM products
        WHERE establishment_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR category ILIKE $2)
        "#,
    )
    .bind(seller.establishment_id)
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = PageMeta::paged(page, limit, total.0);
    Ok(ApiResponse::paged("Products", ProductList { items }, meta))
}

pub async fn get_product(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND establishment_id = $2",
    )
    .bind(id)
    .bind(seller.establishment_id)
    .fetch_optional(pool)
    .await?;

    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::new("Product", product))
}

pub async fn create_product(
    pool: &DbPool,
    seller: &AuthSeller,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    if payload.price.is_sign_negative() {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (id, establishment_id, name, category, price, stock)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller.establishment_id)
    .bind(&payload.name)
    .bind(payload.category.as_deref())
    .bind(payload.price)
    .bind(payload.stock)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new("Product created", product))
}

/// Price changes here never touch historical order lines: those carry the
/// unit price captured at sale time.
pub async fn update_product(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET name = COALESCE($3, name),
            category = COALESCE($4, category),
            price = COALESCE($5, price),
            active = COALESCE($6, active)
        WHERE id = $1 AND establishment_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(seller.establishment_id)
    .bind(payload.name.as_deref())
    .bind(payload.category.as_deref())
    .bind(payload.price)
    .bind(payload.active)
    .fetch_optional(pool)
    .await?;

    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new("Updated", product))
}

pub async fn delete_product(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(seller)?;
    let result = sqlx::query("DELETE FROM products WHERE id = $1 AND establishment_id = $2")
        .bind(id)
        .bind(seller.establishment_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new("Deleted", serde_json::json!({})))
}

pub async fn restock_product(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
    quantity: i32,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(seller)?;
    let stock = inventory::restock(pool, seller.establishment_id, id, quantity).await?;

    if let Err(err) = log_audit(
        pool,
        Some(seller.seller_id),
        "product_restock",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "quantity": quantity, "stock": stock })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::new(
        "Restocked",
        serde_json::json!({ "stock": stock }),
    ))
}
