use chrono::{DateTime, Utc};
use comanda_core::customer::{Customer, CustomerInput};
use comanda_core::error::AppError;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::{db_err, not_found};

pub(crate) const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, points, notes, created_at, updated_at";

#[derive(Clone)]
pub struct CustomerRepository {
    pool: Pool<Postgres>,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List customers, optionally filtered by a case-insensitive search over
    /// name, phone, and email.
    pub async fn list(&self, user_id: Uuid, search: Option<&str>) -> Result<Vec<Customer>, AppError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE user_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2 OR phone ILIKE $2 OR email ILIKE $2)
            ORDER BY name
            "#
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Customer, AppError> {
        self.find(user_id, id)
            .await?
            .ok_or_else(|| not_found("Customer", id))
    }

    pub async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Customer>, AppError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    /// Look up a customer by normalized phone number.
    pub async fn find_by_phone(&self, user_id: Uuid, phone: &str) -> Result<Option<Customer>, AppError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE user_id = $1 AND phone = $2"
        ))
        .bind(user_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    pub async fn create(&self, user_id: Uuid, input: &CustomerInput) -> Result<Customer, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            INSERT INTO customers (user_id, name, phone, email, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(input.normalized_phone())
        .bind(&input.email)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(phone_conflict)?;

        Ok(row.into())
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &CustomerInput,
    ) -> Result<Customer, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            UPDATE customers
            SET name = $3, phone = $4, email = $5, notes = $6, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(input.normalized_phone())
        .bind(&input.email)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(phone_conflict)?;

        row.map(Into::into).ok_or_else(|| not_found("Customer", id))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Customer", id));
        }
        Ok(())
    }

    /// Credit or debit points manually. The balance never goes negative.
    pub async fn adjust_points(
        &self,
        user_id: Uuid,
        id: Uuid,
        delta: i64,
        reason: Option<&str>,
    ) -> Result<Customer, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let balance: Option<(i64,)> = sqlx::query_as(
            "SELECT points FROM customers WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let (balance,) = balance.ok_or_else(|| not_found("Customer", id))?;
        let target = balance.checked_add(delta).ok_or_else(|| {
            AppError::ValidationError(format!("Points adjustment {delta} is out of range"))
        })?;
        if target < 0 {
            return Err(AppError::InsufficientPoints {
                required: delta.saturating_neg(),
                available: balance,
            });
        }

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            UPDATE customers
            SET points = points + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        tracing::info!(customer_id = %id, delta, reason = reason.unwrap_or(""), "Points adjusted");
        Ok(row.into())
    }
}

fn phone_conflict(e: sqlx::Error) -> AppError {
    match db_err(e) {
        AppError::Conflict(_) => {
            AppError::Conflict("Another customer already uses this phone number".into())
        }
        other => other,
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
pub(crate) struct CustomerRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    points: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            points: row.points,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("ana"), "ana");
    }
}
