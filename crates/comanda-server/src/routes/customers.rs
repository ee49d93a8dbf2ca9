use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::customer::{Customer, CustomerInput, PointsAdjustment};

use crate::auth::CurrentUser;
use crate::dto::ListCustomersQuery;
use crate::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/customers",
    params(ListCustomersQuery),
    responses((status = 200, description = "Customers by name", body = Vec<Customer>)),
    security(("session" = [])),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<ListCustomersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let customers = state
        .db
        .customer_repo()
        .list(user.id, query.search.as_deref())
        .await?;
    Ok(axum::Json(customers))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer with points balance", body = Customer),
        (status = 404, description = "Customer not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state.db.customer_repo().get(user.id, id).await?;
    Ok(axum::Json(customer))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CustomerInput,
    responses(
        (status = 201, description = "Customer created", body = Customer),
        (status = 400, description = "Invalid customer", body = crate::dto::ErrorResponse),
        (status = 409, description = "Phone already used", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<CustomerInput>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state.db.customer_repo().create(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(customer)))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = CustomerInput,
    responses(
        (status = 200, description = "Customer updated", body = Customer),
        (status = 404, description = "Customer not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Phone already used", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<CustomerInput>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state.db.customer_repo().update(user.id, id, &body).await?;
    Ok(axum::Json(customer))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.customer_repo().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/customers/{id}/points",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = PointsAdjustment,
    responses(
        (status = 200, description = "Balance adjusted", body = Customer),
        (status = 400, description = "Adjustment out of range", body = crate::dto::ErrorResponse),
        (status = 422, description = "Balance would go negative", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "customers"
)]
pub async fn adjust_points(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<PointsAdjustment>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let customer = state
        .db
        .customer_repo()
        .adjust_points(user.id, id, body.delta, body.reason.as_deref())
        .await?;
    Ok(axum::Json(customer))
}
