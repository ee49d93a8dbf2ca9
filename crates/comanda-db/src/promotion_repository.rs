use chrono::{DateTime, Utc};
use comanda_core::error::AppError;
use comanda_core::promotion::{DiscountKind, Promotion, PromotionInput};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::{db_err, not_found};

pub(crate) const PROMOTION_COLUMNS: &str = "id, name, description, discount_kind, discount_value, starts_at, ends_at, active, created_at";

#[derive(Clone)]
pub struct PromotionRepository {
    pool: Pool<Postgres>,
}

impl PromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List promotions. With `active_only`, only those applicable right now.
    pub async fn list(&self, user_id: Uuid, active_only: bool) -> Result<Vec<Promotion>, AppError> {
        let rows = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            WHERE user_id = $1
              AND (NOT $2 OR (active
                   AND (starts_at IS NULL OR starts_at <= NOW())
                   AND (ends_at IS NULL OR ends_at >= NOW())))
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Promotion, AppError> {
        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Promotion", id))
    }

    pub async fn create(&self, user_id: Uuid, input: &PromotionInput) -> Result<Promotion, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            INSERT INTO promotions (user_id, name, description, discount_kind, discount_value, starts_at, ends_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.discount_kind.as_str())
        .bind(input.discount_value)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.active)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &PromotionInput,
    ) -> Result<Promotion, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            UPDATE promotions
            SET name = $3, description = $4, discount_kind = $5, discount_value = $6,
                starts_at = $7, ends_at = $8, active = $9
            WHERE id = $1 AND user_id = $2
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.discount_kind.as_str())
        .bind(input.discount_value)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Promotion", id))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Promotion", id));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PromotionRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    discount_kind: String,
    discount_value: i64,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<PromotionRow> for Promotion {
    fn from(row: PromotionRow) -> Self {
        Promotion {
            id: row.id,
            name: row.name,
            description: row.description,
            discount_kind: row.discount_kind.parse().unwrap_or(DiscountKind::Fixed),
            discount_value: row.discount_value,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            active: row.active,
            created_at: row.created_at,
        }
    }
}
