use chrono::{DateTime, Utc};
use comanda_core::error::AppError;
use comanda_core::payment::{PaymentMethod, PaymentMethodInput};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::{db_err, not_found};

#[derive(Clone)]
pub struct PaymentMethodRepository {
    pool: Pool<Postgres>,
}

impl PaymentMethodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<PaymentMethod>, AppError> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(
            r#"
            SELECT id, name, active, created_at
            FROM payment_methods
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

    pub async fn create(
        &self,
        user_id: Uuid,
        input: &PaymentMethodInput,
    ) -> Result<PaymentMethod, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, PaymentMethodRow>(
            r#"
            INSERT INTO payment_methods (user_id, name, active)
            VALUES ($1, $2, $3)
            RETURNING id, name, active, created_at
            "#,
        )
        .bind(user_id)
        .bind(input.name.trim())
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
        input: &PaymentMethodInput,
    ) -> Result<PaymentMethod, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, PaymentMethodRow>(
            r#"
            UPDATE payment_methods
            SET name = $3, active = $4
            WHERE id = $1 AND user_id = $2
            RETURNING id, name, active, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| not_found("Payment method", id))
    }

    /// Delete a payment method. Orders that used it keep a NULL reference.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Payment method", id));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PaymentMethodRow {
    id: Uuid,
    name: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            id: row.id,
            name: row.name,
            active: row.active,
            created_at: row.created_at,
        }
    }
}
