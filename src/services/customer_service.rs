use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::customers::{
        CreateCustomerRequest, CustomerList, FindOrCreateCustomerRequest, UpdateCustomerRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthSeller,
    models::{CUSTOMER_NEW, Customer},
    response::{ApiResponse, PageMeta},
    routes::params::CustomerQuery,
};

pub async fn list_customers(
    pool: &DbPool,
    seller: &AuthSeller,
    query: CustomerQuery,
) -> AppResult<ApiResponse<CustomerList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let pattern = query
        .q
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let items = sqlx::query_as::<_, Customer>(
        r#"
        SELECT * FROM customers
        WHERE establishment_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR phone ILIKE $2)
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
        SELECT COUNT(*) FROM customers
        WHERE establishment_id = $1
          AND ($2::text IS NULL OR name ILIKE $2 OR phone ILIKE $2)
        "#,
    )
    .bind(seller.establishment_id)
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let meta = PageMeta::paged(page, limit, total.0);
    Ok(ApiResponse::paged("Customers", CustomerList { items }, meta))
}

pub async fn get_customer(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
) -> AppResult<ApiResponse<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE id = $1 AND establishment_id = $2",
    )
    .bind(id)
    .bind(seller.establishment_id)
    .fetch_optional(pool)
    .await?;

    match customer {
        Some(c) => Ok(ApiResponse::new("Customer", c)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_customer(
    pool: &DbPool,
    seller: &AuthSeller,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (id, establishment_id, name, phone, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller.establishment_id)
    .bind(&payload.name)
    .bind(payload.phone.as_deref())
    .bind(CUSTOMER_NEW)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::new("Customer created", customer))
}

pub async fn update_customer(
    pool: &DbPool,
    seller: &AuthSeller,
    id: Uuid,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
        SET name = COALESCE($3, name),
            phone = COALESCE($4, phone),
            status = COALESCE($5, status)
        WHERE id = $1 AND establishment_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(seller.establishment_id)
    .bind(payload.name.as_deref())
    .bind(payload.phone.as_deref())
    .bind(payload.status.as_deref())
    .fetch_optional(pool)
    .await?;

    match customer {
        Some(c) => Ok(ApiResponse::new("Updated", c)),
        None => Err(AppError::NotFound),
    }
}

/// Look a customer up by phone within the establishment, creating a `New`
/// one when no match exists. Phone is a natural key without a uniqueness
/// constraint, so on duplicates the oldest record wins.
pub async fn find_or_create_by_phone(
    pool: &DbPool,
    seller: &AuthSeller,
    payload: FindOrCreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone must not be empty".into()));
    }

    let existing = sqlx::query_as::<_, Customer>(
        r#"
        SELECT * FROM customers
        WHERE establishment_id = $1 AND phone = $2
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .bind(seller.establishment_id)
    .bind(&payload.phone)
    .fetch_optional(pool)
    .await?;

    if let Some(customer) = existing {
        return Ok(ApiResponse::new("Customer", customer));
    }

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (id, establishment_id, name, phone, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller.establishment_id)
    .bind(&payload.name)
    .bind(&payload.phone)
    .bind(CUSTOMER_NEW)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::new("Customer created", customer))
}
