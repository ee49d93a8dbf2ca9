use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// How a promotion reduces an order subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `discount_value` is a percentage in `0..=100`.
    Percent,
    /// `discount_value` is an amount in cents.
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percent => "percent",
            DiscountKind::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "percent" => Ok(DiscountKind::Percent),
            "fixed" => Ok(DiscountKind::Fixed),
            _ => Err(format!("Unknown discount kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub discount_kind: DiscountKind,
    pub discount_value: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Whether the promotion can be applied at `now`.
    pub fn is_applicable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.starts_at.is_none_or(|start| start <= now)
            && self.ends_at.is_none_or(|end| now <= end)
    }

    /// Discount in cents for `subtotal_cents`, never more than the subtotal.
    pub fn discount_for(&self, subtotal_cents: i64, now: DateTime<Utc>) -> i64 {
        if !self.is_applicable(now) || subtotal_cents <= 0 {
            return 0;
        }
        let discount = match self.discount_kind {
            DiscountKind::Percent => {
                i128::from(subtotal_cents) * i128::from(self.discount_value) / 100
            }
            DiscountKind::Fixed => i128::from(self.discount_value),
        };
        // Clamped into 0..=subtotal, so the narrowing cannot fail.
        i64::try_from(discount.clamp(0, i128::from(subtotal_cents))).unwrap_or(subtotal_cents)
    }
}

/// Create/replace payload for a promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PromotionInput {
    pub name: String,
    pub description: Option<String>,
    pub discount_kind: DiscountKind,
    pub discount_value: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PromotionInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Promotion name must not be empty".into(),
            ));
        }
        match self.discount_kind {
            DiscountKind::Percent if !(0..=100).contains(&self.discount_value) => {
                return Err(AppError::ValidationError(format!(
                    "Invalid percent discount {}: must be between 0 and 100",
                    self.discount_value
                )));
            }
            DiscountKind::Fixed if self.discount_value < 0 => {
                return Err(AppError::ValidationError(format!(
                    "Invalid fixed discount {}: must not be negative",
                    self.discount_value
                )));
            }
            _ => {}
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at)
            && end < start
        {
            return Err(AppError::ValidationError(
                "Promotion ends_at must not be before starts_at".into(),
            ));
        }
        Ok(())
    }
}
