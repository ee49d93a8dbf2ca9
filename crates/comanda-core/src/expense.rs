use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SupplierInput {
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl SupplierInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Supplier name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Money spent by the restaurant, optionally attributed to a supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Expense {
    pub id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub category: String,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub incurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExpenseInput {
    pub supplier_id: Option<Uuid>,
    pub category: String,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub incurred_on: NaiveDate,
}

impl ExpenseInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.category.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Expense category must not be empty".into(),
            ));
        }
        if self.amount_cents <= 0 {
            return Err(AppError::ValidationError(format!(
                "Invalid amount_cents {}: must be positive",
                self.amount_cents
            )));
        }
        Ok(())
    }
}

/// Filters for listing expenses. Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CategoryTotal {
    pub category: String,
    pub total_cents: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExpenseSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub total_cents: i64,
    pub by_category: Vec<CategoryTotal>,
}
