use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::payment::{PaymentMethod, PaymentMethodInput};

use crate::auth::CurrentUser;
use crate::error::{ApiError, AppJson, AppPath};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/payment-methods",
    responses((status = 200, description = "Payment methods", body = Vec<PaymentMethod>)),
    security(("session" = [])),
    tag = "payment_methods"
)]
pub async fn list_payment_methods(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let methods = state.db.payment_repo().list(user.id).await?;
    Ok(axum::Json(methods))
}

#[utoipa::path(
    post,
    path = "/api/payment-methods",
    request_body = PaymentMethodInput,
    responses(
        (status = 201, description = "Payment method created", body = PaymentMethod),
        (status = 409, description = "Duplicate name", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "payment_methods"
)]
pub async fn create_payment_method(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<PaymentMethodInput>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state.db.payment_repo().create(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(method)))
}

#[utoipa::path(
    put,
    path = "/api/payment-methods/{id}",
    params(("id" = Uuid, Path, description = "Payment method ID")),
    request_body = PaymentMethodInput,
    responses(
        (status = 200, description = "Payment method updated", body = PaymentMethod),
        (status = 404, description = "Payment method not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "payment_methods"
)]
pub async fn update_payment_method(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<PaymentMethodInput>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state.db.payment_repo().update(user.id, id, &body).await?;
    Ok(axum::Json(method))
}

#[utoipa::path(
    delete,
    path = "/api/payment-methods/{id}",
    params(("id" = Uuid, Path, description = "Payment method ID")),
    responses(
        (status = 204, description = "Payment method deleted"),
        (status = 404, description = "Payment method not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "payment_methods"
)]
pub async fn delete_payment_method(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.payment_repo().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
