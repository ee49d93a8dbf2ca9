use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::order::{PointsPreview, Redemption, RedemptionRevert};
use comanda_core::points::{PointsRule, PointsRuleInput};

use crate::auth::CurrentUser;
use crate::dto::{PreviewRequest, RedeemRequest, RevertRedeemRequest};
use crate::error::{ApiError, AppJson, AppPath};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Points rules
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/rewards/config",
    responses((status = 200, description = "Points rules", body = Vec<PointsRule>)),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rules = state.db.points_repo().list(user.id).await?;
    Ok(axum::Json(rules))
}

#[utoipa::path(
    post,
    path = "/api/rewards/config",
    request_body = PointsRuleInput,
    responses(
        (status = 201, description = "Rule created", body = PointsRule),
        (status = 400, description = "Rule is missing its target", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<PointsRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.db.points_repo().create(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(rule)))
}

#[utoipa::path(
    put,
    path = "/api/rewards/config/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    request_body = PointsRuleInput,
    responses(
        (status = 200, description = "Rule updated", body = PointsRule),
        (status = 404, description = "Rule not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<PointsRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.db.points_repo().update(user.id, id, &body).await?;
    Ok(axum::Json(rule))
}

#[utoipa::path(
    delete,
    path = "/api/rewards/config/{id}",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.points_repo().delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Preview & redemption
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/rewards/preview",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Totals and points the order would earn", body = PointsPreview),
        (status = 400, description = "Invalid items or promotion", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<PreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let preview = state
        .db
        .order_repo()
        .preview(user.id, &body.items, body.promotion_id)
        .await?;
    Ok(axum::Json(preview))
}

#[utoipa::path(
    post,
    path = "/api/rewards/redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Product added to the order for points", body = Redemption),
        (status = 409, description = "Order is not open", body = crate::dto::ErrorResponse),
        (status = 422, description = "Not enough points", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn redeem(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<RedeemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let redemption = state
        .db
        .order_repo()
        .redeem(user.id, body.order_id, body.product_id)
        .await?;
    Ok(axum::Json(redemption))
}

#[utoipa::path(
    post,
    path = "/api/rewards/revert",
    request_body = RevertRedeemRequest,
    responses(
        (status = 200, description = "Redemption undone and points refunded", body = RedemptionRevert),
        (status = 404, description = "Redeemed line not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "Order is not open", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "rewards"
)]
pub async fn revert(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<RevertRedeemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reverted = state
        .db
        .order_repo()
        .revert_redemption(user.id, body.order_item_id)
        .await?;
    Ok(axum::Json(reverted))
}
