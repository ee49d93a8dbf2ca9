use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::util::normalize_phone;

/// A restaurant customer with a loyalty points balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub points: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/replace payload for a customer. The points balance is not part of
/// it; balances move only through orders, redemptions, and adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CustomerInput {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl CustomerInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Customer name must not be empty".into(),
            ));
        }
        if let Some(phone) = &self.phone
            && !phone.trim().is_empty()
            && normalize_phone(phone).is_empty()
        {
            return Err(AppError::ValidationError(format!(
                "Invalid phone '{phone}': must contain digits"
            )));
        }
        Ok(())
    }

    /// Phone reduced to digits; blank phones become `None`.
    pub fn normalized_phone(&self) -> Option<String> {
        self.phone
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty())
    }
}

/// Manual correction of a customer's points balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PointsAdjustment {
    /// Positive to credit, negative to debit.
    pub delta: i64,
    pub reason: Option<String>,
}

/// Largest credit or debit accepted in one manual adjustment.
pub const MAX_POINTS_ADJUSTMENT: i64 = 10_000_000;

impl PointsAdjustment {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(-MAX_POINTS_ADJUSTMENT..=MAX_POINTS_ADJUSTMENT).contains(&self.delta) {
            return Err(AppError::ValidationError(format!(
                "Invalid delta {}: must be within ±{MAX_POINTS_ADJUSTMENT}",
                self.delta
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_phone() {
        let input = CustomerInput {
            name: "Ana".into(),
            phone: Some("+55 11 98888-7777".into()),
            email: None,
            notes: None,
        };
        assert_eq!(input.normalized_phone().as_deref(), Some("5511988887777"));

        let blank = CustomerInput {
            phone: Some("   ".into()),
            ..input.clone()
        };
        assert!(blank.normalized_phone().is_none());
        assert!(blank.validate().is_ok());
    }

    #[test]
    fn test_phone_without_digits_rejected() {
        let input = CustomerInput {
            name: "Ana".into(),
            phone: Some("call me".into()),
            email: None,
            notes: None,
        };
        assert!(matches!(
            input.validate(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_points_adjustment_bounds() {
        let adjustment = |delta| PointsAdjustment {
            delta,
            reason: None,
        };
        assert!(adjustment(-MAX_POINTS_ADJUSTMENT).validate().is_ok());
        assert!(adjustment(MAX_POINTS_ADJUSTMENT).validate().is_ok());
        assert!(adjustment(i64::MIN).validate().is_err());
        assert!(adjustment(i64::MAX).validate().is_err());
    }
}
