use chrono::{DateTime, NaiveDate, Utc};
use comanda_core::error::AppError;
use comanda_core::expense::{
    CategoryTotal, Expense, ExpenseFilter, ExpenseInput, ExpenseSummary, Supplier, SupplierInput,
};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::{db_err, not_found};

const SUPPLIER_COLUMNS: &str = "id, name, contact_name, phone, email, notes, created_at";
const EXPENSE_COLUMNS: &str =
    "id, supplier_id, category, description, amount_cents, incurred_on, created_at";

/// Suppliers and the expenses paid to them.
#[derive(Clone)]
pub struct ExpenseRepository {
    pool: Pool<Postgres>,
}

impl ExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -- Suppliers --

    pub async fn list_suppliers(&self, user_id: Uuid) -> Result<Vec<Supplier>, AppError> {
        let rows = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE user_id = $1 ORDER BY name"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_supplier(&self, user_id: Uuid, id: Uuid) -> Result<Supplier, AppError> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Supplier", id))
    }

    pub async fn create_supplier(
        &self,
        user_id: Uuid,
        input: &SupplierInput,
    ) -> Result<Supplier, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            INSERT INTO suppliers (user_id, name, contact_name, phone, email, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn update_supplier(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &SupplierInput,
    ) -> Result<Supplier, AppError> {
        input.validate()?;
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            UPDATE suppliers
            SET name = $3, contact_name = $4, phone = $5, email = $6, notes = $7
            WHERE id = $1 AND user_id = $2
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.name.trim())
        .bind(&input.contact_name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Supplier", id))
    }

    /// Delete a supplier. Its expenses stay, without a supplier.
    pub async fn delete_supplier(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Supplier", id));
        }
        Ok(())
    }

    async fn ensure_supplier(&self, user_id: Uuid, supplier_id: Option<Uuid>) -> Result<(), AppError> {
        let Some(supplier_id) = supplier_id else {
            return Ok(());
        };
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM suppliers WHERE id = $1 AND user_id = $2")
                .bind(supplier_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        if found.is_none() {
            return Err(AppError::ValidationError(format!(
                "Unknown supplier: {supplier_id}"
            )));
        }
        Ok(())
    }

    // -- Expenses --

    /// Newest first. Date bounds are inclusive.
    pub async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ExpenseFilter,
    ) -> Result<Vec<Expense>, AppError> {
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
            FROM expenses
            WHERE user_id = $1
              AND ($2::date IS NULL OR incurred_on >= $2)
              AND ($3::date IS NULL OR incurred_on <= $3)
              AND ($4::uuid IS NULL OR supplier_id = $4)
              AND ($5::text IS NULL OR category = $5)
            ORDER BY incurred_on DESC, created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.supplier_id)
        .bind(filter.category.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_expense(&self, user_id: Uuid, id: Uuid) -> Result<Expense, AppError> {
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Expense", id))
    }

    pub async fn create_expense(&self, user_id: Uuid, input: &ExpenseInput) -> Result<Expense, AppError> {
        input.validate()?;
        self.ensure_supplier(user_id, input.supplier_id).await?;

        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"
            INSERT INTO expenses (user_id, supplier_id, category, description, amount_cents, incurred_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.supplier_id)
        .bind(input.category.trim())
        .bind(&input.description)
        .bind(input.amount_cents)
        .bind(input.incurred_on)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    pub async fn update_expense(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: &ExpenseInput,
    ) -> Result<Expense, AppError> {
        input.validate()?;
        self.ensure_supplier(user_id, input.supplier_id).await?;

        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"
            UPDATE expenses
            SET supplier_id = $3, category = $4, description = $5, amount_cents = $6, incurred_on = $7
            WHERE id = $1 AND user_id = $2
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.supplier_id)
        .bind(input.category.trim())
        .bind(&input.description)
        .bind(input.amount_cents)
        .bind(input.incurred_on)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| not_found("Expense", id))
    }

    pub async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(not_found("Expense", id));
        }
        Ok(())
    }

    /// Totals per category over an inclusive date range, largest first.
    pub async fn summary(
        &self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<ExpenseSummary, AppError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT category, SUM(amount_cents)::BIGINT AS total_cents, COUNT(*) AS count
            FROM expenses
            WHERE user_id = $1
              AND ($2::date IS NULL OR incurred_on >= $2)
              AND ($3::date IS NULL OR incurred_on <= $3)
            GROUP BY category
            ORDER BY total_cents DESC, category
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let by_category: Vec<CategoryTotal> = rows
            .into_iter()
            .map(|(category, total_cents, count)| CategoryTotal {
                category,
                total_cents,
                count,
            })
            .collect();

        Ok(ExpenseSummary {
            from,
            to,
            total_cents: by_category.iter().map(|c| c.total_cents).sum(),
            by_category,
        })
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SupplierRow {
    id: Uuid,
    name: String,
    contact_name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            name: row.name,
            contact_name: row.contact_name,
            phone: row.phone,
            email: row.email,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExpenseRow {
    id: Uuid,
    supplier_id: Option<Uuid>,
    category: String,
    description: Option<String>,
    amount_cents: i64,
    incurred_on: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            supplier_id: row.supplier_id,
            category: row.category,
            description: row.description,
            amount_cents: row.amount_cents,
            incurred_on: row.incurred_on,
            created_at: row.created_at,
        }
    }
}
