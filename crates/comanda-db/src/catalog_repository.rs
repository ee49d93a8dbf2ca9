use chrono::{DateTime, Utc};
use comanda_core::catalog::{Category, CategoryInput, Product, ProductFilter, ProductInput};
use comanda_core::error::AppError;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::{db_err, not_found};

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, category_id, name, description, price_cents, cost_cents, active, created_at, updated_at";

/// Categories and products of a tenant's menu.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -- Categories --

    pub async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>, AppError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, description, created_at
            FROM categories
            WHERE user_id = $1
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_category(
        &self,
        user_id: Uuid,
        input: &CategoryInput,
    ) -> Result<Category, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (user_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn update_category(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &CategoryInput,
    ) -> Result<Category, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories
            SET name = $3, description = $4
            WHERE id = $1 AND user_id = $2
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Category", id))
    }

    /// Delete a category. Its products become uncategorized.
    pub async fn delete_category(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Category", id));
        }
        Ok(())
    }

    async fn ensure_category(&self, user_id: Uuid, category_id: Option<Uuid>) -> Result<(), AppError> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM categories WHERE id = $1 AND user_id = $2")
                .bind(category_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        if exists.is_none() {
            return Err(AppError::ValidationError(format!(
                "Unknown category: {category_id}"
            )));
        }
        Ok(())
    }

    // -- Products --

    pub async fn list_products(
        &self,
        user_id: Uuid,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR category_id = $2)
              AND ($3::boolean IS NULL OR active = $3)
            ORDER BY name
            "#
        ))
        .bind(user_id)
        .bind(filter.category_id)
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active products, cheapest first inside each category.
    pub async fn menu(&self, user_id: Uuid) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE user_id = $1 AND active
            ORDER BY category_id NULLS LAST, price_cents, name
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_product(&self, user_id: Uuid, id: Uuid) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Product", id))
    }

    pub async fn create_product(
        &self,
        user_id: Uuid,
        input: &ProductInput,
    ) -> Result<Product, AppError> {
        input.validate()?;
        self.ensure_category(user_id, input.category_id).await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (user_id, category_id, name, description, price_cents, cost_cents, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price_cents)
        .bind(input.cost_cents)
        .bind(input.active)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(product_id = %row.id, "Product created");
        Ok(row.into())
    }

    pub async fn update_product(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &ProductInput,
    ) -> Result<Product, AppError> {
        input.validate()?;
        self.ensure_category(user_id, input.category_id).await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET category_id = $3, name = $4, description = $5, price_cents = $6,
                cost_cents = $7, active = $8, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price_cents)
        .bind(input.cost_cents)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Product", id))
    }

    /// Delete a product. Past order lines keep their name snapshot.
    pub async fn delete_product(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Product", id));
        }
        Ok(())
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    category_id: Option<Uuid>,
    name: String,
    description: Option<String>,
    price_cents: i64,
    cost_cents: i64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            cost_cents: row.cost_cents,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
