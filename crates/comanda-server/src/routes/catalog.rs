use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use comanda_core::catalog::{Category, CategoryInput, Product, ProductFilter, ProductInput};

use crate::auth::CurrentUser;
use crate::dto::ListProductsQuery;
use crate::error::{ApiError, AppJson, AppPath, AppQuery};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories by name", body = Vec<Category>)),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.db.catalog_repo().list_categories(user.id).await?;
    Ok(axum::Json(categories))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid category", body = crate::dto::ErrorResponse),
        (status = 409, description = "Duplicate name", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<CategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.db.catalog_repo().create_category(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(category)))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<CategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .db
        .catalog_repo()
        .update_category(user.id, id, &body)
        .await?;
    Ok(axum::Json(category))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted; its products become uncategorized"),
        (status = 404, description = "Category not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.catalog_repo().delete_category(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/products",
    params(ListProductsQuery),
    responses((status = 200, description = "Products", body = Vec<Product>)),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppQuery(query): AppQuery<ListProductsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = ProductFilter {
        category_id: query.category_id,
        active: query.active,
    };
    let products = state.db.catalog_repo().list_products(user.id, &filter).await?;
    Ok(axum::Json(products))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.db.catalog_repo().get_product(user.id, id).await?;
    Ok(axum::Json(product))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid product or unknown category", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppJson(body): AppJson<ProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.db.catalog_repo().create_product(user.id, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(product)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<ProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .db
        .catalog_repo()
        .update_product(user.id, id, &body)
        .await?;
    Ok(axum::Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted; past order lines keep their snapshot"),
        (status = 404, description = "Product not found", body = crate::dto::ErrorResponse),
    ),
    security(("session" = [])),
    tag = "catalog"
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.catalog_repo().delete_product(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
