use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::response::IntoResponse;

use comanda_core::report::SalesSummary;

use crate::auth::CurrentUser;
use crate::dto::SalesReportQuery;
use crate::error::{ApiError, AppQuery};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/reports/sales",
    params(SalesReportQuery),
    responses(
        (status = 200, description = "Completed-order totals for the date range", body = SalesSummary),
        (status = 400, description = "`from` is after `to`", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "reports"
)]
pub async fn sales_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<SalesReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .db
        .report_repo()
        .sales_summary(user.id, query.from, query.to)
        .await?;
    Ok(axum::Json(summary))
}
