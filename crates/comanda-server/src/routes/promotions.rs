use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::promotion::{Promotion, PromotionInput};

use crate::auth::CurrentUser;
use crate::dto::ListPromotionsQuery;
use crate::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/promotions",
    params(ListPromotionsQuery),
    responses((status = 200, description = "Promotions", body = Vec<Promotion>)),
    security(("session" = [])),
    tag = "promotions"
)]
pub async fn list_promotions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<ListPromotionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let promotions = state
        .db
        .promotion_repo()
        .list(user.id, query.active_only)
        .await?;
    Ok(axum::Json(promotions))
}

#[utoipa::path(
    get,
    path = "/api/promotions/{id}",
    params(("id" = Uuid, Path, description = "Promotion ID")),
    responses(
        (status = 200, description = "Promotion", body = Promotion),
        (status = 404, description = "Promotion not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "promotions"
)]
pub async fn get_promotion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let promotion = state.db.promotion_repo().get(user.id, id).await?;
    Ok(axum::Json(promotion))
}

#[utoipa::path(
    post,
    path = "/api/promotions",
    request_body = PromotionInput,
    responses(
        (status = 201, description = "Promotion created", body = Promotion),
        (status = 400, description = "Invalid discount or window", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "promotions"
)]
pub async fn create_promotion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<PromotionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let promotion = state.db.promotion_repo().create(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(promotion)))
}

#[utoipa::path(
    put,
    path = "/api/promotions/{id}",
    params(("id" = Uuid, Path, description = "Promotion ID")),
    request_body = PromotionInput,
    responses(
        (status = 200, description = "Promotion updated", body = Promotion),
        (status = 404, description = "Promotion not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "promotions"
)]
pub async fn update_promotion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<PromotionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let promotion = state.db.promotion_repo().update(user.id, id, &body).await?;
    Ok(axum::Json(promotion))
}

#[utoipa::path(
    delete,
    path = "/api/promotions/{id}",
    params(("id" = Uuid, Path, description = "Promotion ID")),
    responses(
        (status = 204, description = "Promotion deleted"),
        (status = 404, description = "Promotion not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "promotions"
)]
pub async fn delete_promotion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.promotion_repo().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
