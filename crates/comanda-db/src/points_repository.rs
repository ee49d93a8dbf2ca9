use chrono::{DateTime, Utc};
use comanda_core::error::AppError;
use comanda_core::points::{PointsRule, PointsRuleInput, PointsRuleKind};
use sqlx::{PgExecutor, PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::{db_err, not_found};

const RULE_COLUMNS: &str =
    "id, kind, product_id, category_id, min_amount_cents, points, active, created_at";

/// The tenant's loyalty configuration (`points_config`).
#[derive(Clone)]
pub struct PointsRuleRepository {
    pool: Pool<Postgres>,
}

impl PointsRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<PointsRule>, AppError> {
        let rows = sqlx::query_as::<_, PointsRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM points_config
            WHERE user_id = $1
            ORDER BY kind, created_at
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, user_id: Uuid, input: &PointsRuleInput) -> Result<PointsRule, AppError> {
        input.validate()?;
        self.ensure_references(user_id, input).await?;

        let row = sqlx::query_as::<_, PointsRuleRow>(&format!(
            r#"
            INSERT INTO points_config (user_id, kind, product_id, category_id, min_amount_cents, points, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.kind.as_str())
        .bind(input.product_id)
        .bind(input.category_id)
        .bind(input.min_amount_cents)
        .bind(input.points)
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
        input: &PointsRuleInput,
    ) -> Result<PointsRule, AppError> {
        input.validate()?;
        self.ensure_references(user_id, input).await?;

        let row = sqlx::query_as::<_, PointsRuleRow>(&format!(
            r#"
            UPDATE points_config
            SET kind = $3, product_id = $4, category_id = $5, min_amount_cents = $6,
                points = $7, active = $8
            WHERE id = $1 AND user_id = $2
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.kind.as_str())
        .bind(input.product_id)
        .bind(input.category_id)
        .bind(input.min_amount_cents)
        .bind(input.points)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| not_found("Points rule", id))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM points_config WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Points rule", id));
        }
        Ok(())
    }

    /// Product and category references must belong to the same tenant.
    async fn ensure_references(&self, user_id: Uuid, input: &PointsRuleInput) -> Result<(), AppError> {
        if let Some(product_id) = input.product_id {
            let found: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM products WHERE id = $1 AND user_id = $2")
                    .bind(product_id)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;
            if found.is_none() {
                return Err(AppError::ValidationError(format!(
                    "Unknown product: {product_id}"
                )));
            }
        }
        if let Some(category_id) = input.category_id {
            let found: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM categories WHERE id = $1 AND user_id = $2")
                    .bind(category_id)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;
            if found.is_none() {
                return Err(AppError::ValidationError(format!(
                    "Unknown category: {category_id}"
                )));
            }
        }
        Ok(())
    }
}

/// Active rules of a tenant, oldest first so "first matching rule" is stable.
///
/// Takes any executor so order transactions can read the rules they apply.
pub(crate) async fn active_rules<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<PointsRule>, AppError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, PointsRuleRow>(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM points_config
        WHERE user_id = $1 AND active
        ORDER BY created_at, id
        "#
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(db_err)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(sqlx::FromRow)]
struct PointsRuleRow {
    id: Uuid,
    kind: String,
    product_id: Option<Uuid>,
    category_id: Option<Uuid>,
    min_amount_cents: Option<i64>,
    points: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<PointsRuleRow> for PointsRule {
    fn from(row: PointsRuleRow) -> Self {
        // Unknown kinds come back inactive so they never award points.
        let (kind, active) = match row.kind.parse::<PointsRuleKind>() {
            Ok(kind) => (kind, row.active),
            Err(_) => (PointsRuleKind::EarnAmount, false),
        };
        PointsRule {
            id: row.id,
            kind,
            product_id: row.product_id,
            category_id: row.category_id,
            min_amount_cents: row.min_amount_cents,
            points: row.points,
            active,
            created_at: row.created_at,
        }
    }
}
