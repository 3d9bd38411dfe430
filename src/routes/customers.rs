use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::customers::{
        CreateCustomerRequest, CustomerList, FindOrCreateCustomerRequest, UpdateCustomerRequest,
    },
    error::AppResult,
    middleware::auth::AuthSeller,
    models::Customer,
    response::ApiResponse,
    routes::params::CustomerQuery,
    services::customer_service,
};

pub fn router() -> Router<DbPool> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/find-or-create", post(find_or_create_customer))
        .route("/{id}", get(get_customer).put(update_customer))
}

#[utoipa::path(
    get,
    path = "/customers",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search by name or phone")
    ),
    responses(
        (status = 200, description = "Customer list", body = ApiResponse<CustomerList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn list_customers(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<ApiResponse<CustomerList>>> {
    let resp = customer_service::list_customers(&pool, &seller, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/customers/{id}",
    responses(
        (status = 200, description = "Customer detail", body = ApiResponse<Customer>),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let resp = customer_service::get_customer(&pool, &seller, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 200, description = "Customer created", body = ApiResponse<Customer>),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn create_customer(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Json(payload): Json<CreateCustomerRequest>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let resp = customer_service::create_customer(&pool, &seller, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/customers/{id}",
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<Customer>),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn update_customer(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let resp = customer_service::update_customer(&pool, &seller, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/customers/find-or-create",
    request_body = FindOrCreateCustomerRequest,
    responses(
        (status = 200, description = "Existing or newly created customer", body = ApiResponse<Customer>),
    ),
    security(("bearer_auth" = [])),
    tag = "Customers"
)]
pub async fn find_or_create_customer(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Json(payload): Json<FindOrCreateCustomerRequest>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let resp = customer_service::find_or_create_by_phone(&pool, &seller, payload).await?;
    Ok(Json(resp))
}
