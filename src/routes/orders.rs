use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    cart::Cart,
    db::DbPool,
    dto::orders::{
        CheckoutOutcome, CloseOrderRequest, OpenTabRequest, OrderList, OrderWithItems,
        QuickAddRequest, QuickSaleRequest, ReconcileOutcome,
    },
    error::AppResult,
    middleware::auth::AuthSeller,
    models::OrderItem,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
};

pub fn router() -> Router<DbPool> {
    Router::new()
        .route("/", get(list_orders))
        .route("/quick-sale", post(quick_sale))
        .route("/tabs", post(open_tab))
        .route("/{id}", get(get_order))
        .route("/{id}/items", post(quick_add_item))
        .route("/{id}/close", post(close_order))
        .route("/{id}/reconcile", post(reconcile_order))
}

#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status (Aberto, Fechado)"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Order list with customer names", body = ApiResponse<OrderList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&pool, &seller, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    responses(
        (status = 200, description = "Order with customer and lines", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&pool, &seller, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/quick-sale",
    request_body = QuickSaleRequest,
    responses(
        (status = 200, description = "Order committed; pending settlements listed if any", body = ApiResponse<CheckoutOutcome>),
        (status = 409, description = "Insufficient stock, no rows written"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn quick_sale(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Json(payload): Json<QuickSaleRequest>,
) -> AppResult<Json<ApiResponse<CheckoutOutcome>>> {
    let mut cart = Cart::from_snapshot(payload.items)?;
    let resp = order_service::quick_sale(
        &pool,
        &seller,
        &mut cart,
        payload.customer_id,
        &payload.payment_method,
    )
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/tabs",
    request_body = OpenTabRequest,
    responses(
        (status = 200, description = "Tab opened; stock untouched", body = ApiResponse<CheckoutOutcome>),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn open_tab(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Json(payload): Json<OpenTabRequest>,
) -> AppResult<Json<ApiResponse<CheckoutOutcome>>> {
    let mut cart = Cart::from_snapshot(payload.items)?;
    let resp = order_service::open_tab(&pool, &seller, &mut cart, payload.customer_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/items",
    request_body = QuickAddRequest,
    responses(
        (status = 200, description = "One unit appended at current price", body = ApiResponse<OrderItem>),
        (status = 400, description = "Order already closed"),
        (status = 409, description = "Product has no stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn quick_add_item(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuickAddRequest>,
) -> AppResult<Json<ApiResponse<OrderItem>>> {
    let resp = order_service::quick_add_item(&pool, &seller, id, payload.product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/close",
    request_body = CloseOrderRequest,
    responses(
        (status = 200, description = "Tab closed with recomputed total", body = ApiResponse<CheckoutOutcome>),
        (status = 400, description = "Order already closed"),
        (status = 409, description = "Insufficient stock, order left open"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn close_order(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Path(id): Path<Uuid>,
    Json(payload): Json<CloseOrderRequest>,
) -> AppResult<Json<ApiResponse<CheckoutOutcome>>> {
    let resp = order_service::close_order(&pool, &seller, id, &payload.payment_method).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/reconcile",
    responses(
        (status = 200, description = "Pending decrements re-run", body = ApiResponse<ReconcileOutcome>),
        (status = 400, description = "Order is still open"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn reconcile_order(
    State(pool): State<DbPool>,
    seller: AuthSeller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReconcileOutcome>>> {
    let resp = order_service::reconcile_order(&pool, &seller, id).await?;
    Ok(Json(resp))
}
