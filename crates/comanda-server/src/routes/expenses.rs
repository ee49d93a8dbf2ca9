use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::expense::{
    Expense, ExpenseFilter, ExpenseInput, ExpenseSummary, Supplier, SupplierInput,
};

use crate::auth::CurrentUser;
use crate::dto::{DateRangeQuery, ListExpensesQuery};
use crate::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Suppliers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/suppliers",
    responses((status = 200, description = "Suppliers by name", body = Vec<Supplier>)),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn list_suppliers(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let suppliers = state.db.expense_repo().list_suppliers(user.id).await?;
    Ok(axum::Json(suppliers))
}

#[utoipa::path(
    get,
    path = "/api/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier", body = Supplier),
        (status = 404, description = "Supplier not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn get_supplier(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state.db.expense_repo().get_supplier(user.id, id).await?;
    Ok(axum::Json(supplier))
}

#[utoipa::path(
    post,
    path = "/api/suppliers",
    request_body = SupplierInput,
    responses(
        (status = 201, description = "Supplier created", body = Supplier),
        (status = 400, description = "Invalid supplier", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn create_supplier(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<SupplierInput>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state.db.expense_repo().create_supplier(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(supplier)))
}

#[utoipa::path(
    put,
    path = "/api/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = SupplierInput,
    responses(
        (status = 200, description = "Supplier updated", body = Supplier),
        (status = 404, description = "Supplier not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn update_supplier(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<SupplierInput>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state
        .db
        .expense_repo()
        .update_supplier(user.id, id, &body)
        .await?;
    Ok(axum::Json(supplier))
}

#[utoipa::path(
    delete,
    path = "/api/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 204, description = "Supplier deleted; its expenses are kept"),
        (status = 404, description = "Supplier not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn delete_supplier(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.expense_repo().delete_supplier(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/expenses",
    params(ListExpensesQuery),
    responses((status = 200, description = "Expenses, newest first", body = Vec<Expense>)),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<ListExpensesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ExpenseFilter {
        from: query.from,
        to: query.to,
        supplier_id: query.supplier_id,
        category: query.category,
    };
    let expenses = state.db.expense_repo().list_expenses(user.id, &filter).await?;
    Ok(axum::Json(expenses))
}

#[utoipa::path(
    get,
    path = "/api/expenses/summary",
    params(DateRangeQuery),
    responses((status = 200, description = "Totals per category", body = ExpenseSummary)),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn expense_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<DateRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .db
        .expense_repo()
        .summary(user.id, query.from, query.to)
        .await?;
    Ok(axum::Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense", body = Expense),
        (status = 404, description = "Expense not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state.db.expense_repo().get_expense(user.id, id).await?;
    Ok(axum::Json(expense))
}

#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = ExpenseInput,
    responses(
        (status = 201, description = "Expense recorded", body = Expense),
        (status = 400, description = "Invalid expense", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<ExpenseInput>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state.db.expense_repo().create_expense(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(expense)))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense ID")),
    request_body = ExpenseInput,
    responses(
        (status = 200, description = "Expense updated", body = Expense),
        (status = 404, description = "Expense not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<ExpenseInput>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state
        .db
        .expense_repo()
        .update_expense(user.id, id, &body)
        .await?;
    Ok(axum::Json(expense))
}

#[utoipa::path(
    delete,
    path = "/api/expenses/{id}",
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 204, description = "Expense deleted"),
        (status = 404, description = "Expense not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "expenses"
)]
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.expense_repo().delete_expense(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
