use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::order::{Order, OrderFilter, OrderInput};

use crate::auth::CurrentUser;
use crate::dto::{ListOrdersQuery, OrderListResponse, UpdateOrderStatusRequest};
use crate::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/orders",
    params(ListOrdersQuery),
    responses((status = 200, description = "Orders, newest first", body = OrderListResponse)),
    security(("session" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = OrderFilter {
        status: query.status,
        customer_id: query.customer_id,
        from: query.from,
        to: query.to,
        limit: query.limit,
    };
    let orders = state.db.order_repo().list(user.id, &filter).await?;
    let total = orders.len();
    Ok(axum::Json(OrderListResponse { orders, total }))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = OrderInput,
    responses(
        (status = 201, description = "Order created; completed orders accrue points", body = Order),
        (status = 400, description = "Invalid items, customer, or promotion", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<OrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.db.order_repo().create(user.id, &body).await?;
    tracing::info!(order_id = %order.id, total_cents = order.total_cents, "Order created");
    Ok((StatusCode::CREATED, axum::Json(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = Order),
        (status = 404, description = "Order not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.db.order_repo().get(user.id, id).await?;
    Ok(axum::Json(order))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed and points settled", body = Order),
        (status = 404, description = "Order not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .db
        .order_repo()
        .update_status(user.id, id, body.status)
        .await?;
    Ok(axum::Json(order))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Completed orders must be cancelled instead", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.order_repo().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
