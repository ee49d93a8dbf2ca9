//! Loyalty points rules.
//!
//! A tenant's `points_config` is a short list of rules evaluated with a
//! linear scan:
//!
//! - `earn_product`: `points` per unit of a specific product
//! - `earn_category`: `points` per unit of any product in a category, used
//!   only when no product rule matched that line
//! - `earn_amount`: `points` once when the order total reaches
//!   `min_amount_cents`; only the highest reached threshold counts
//! - `redeem_product`: the product can be redeemed for `points`
//!
//! When several rules of the same kind match, the first one in list order
//! (oldest) wins.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Upper bound for the points a single rule awards or costs.
pub const MAX_RULE_POINTS: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PointsRuleKind {
    EarnProduct,
    EarnCategory,
    EarnAmount,
    RedeemProduct,
}

impl PointsRuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsRuleKind::EarnProduct => "earn_product",
            PointsRuleKind::EarnCategory => "earn_category",
            PointsRuleKind::EarnAmount => "earn_amount",
            PointsRuleKind::RedeemProduct => "redeem_product",
        }
    }
}

impl fmt::Display for PointsRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PointsRuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earn_product" => Ok(PointsRuleKind::EarnProduct),
            "earn_category" => Ok(PointsRuleKind::EarnCategory),
            "earn_amount" => Ok(PointsRuleKind::EarnAmount),
            "redeem_product" => Ok(PointsRuleKind::RedeemProduct),
            _ => Err(format!("Unknown points rule kind: {}", s)),
        }
    }
}

/// One row of a tenant's points configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PointsRule {
    pub id: Uuid,
    pub kind: PointsRuleKind,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub min_amount_cents: Option<i64>,
    pub points: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Create/replace payload for a points rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PointsRuleInput {
    pub kind: PointsRuleKind,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub min_amount_cents: Option<i64>,
    pub points: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PointsRuleInput {
    /// Each kind requires exactly the target field it matches on.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=MAX_RULE_POINTS).contains(&self.points) {
            return Err(AppError::ValidationError(format!(
                "Invalid points {}: must be between 1 and {MAX_RULE_POINTS}",
                self.points
            )));
        }
        match self.kind {
            PointsRuleKind::EarnProduct | PointsRuleKind::RedeemProduct => {
                if self.product_id.is_none() {
                    return Err(AppError::ValidationError(format!(
                        "{} rules require product_id",
                        self.kind
                    )));
                }
            }
            PointsRuleKind::EarnCategory => {
                if self.category_id.is_none() {
                    return Err(AppError::ValidationError(
                        "earn_category rules require category_id".into(),
                    ));
                }
            }
            PointsRuleKind::EarnAmount => match self.min_amount_cents {
                Some(min) if min >= 0 => {}
                _ => {
                    return Err(AppError::ValidationError(
                        "earn_amount rules require a non-negative min_amount_cents".into(),
                    ));
                }
            },
        }
        Ok(())
    }
}

/// The part of an order line the points rules look at.
#[derive(Debug, Clone)]
pub struct PointsLine {
    pub product_id: Uuid,
    pub category_id: Option<Uuid>,
    pub quantity: i64,
    /// Redeemed lines were paid with points and never earn more.
    pub redeemed: bool,
}

/// Points earned by an order with the given lines and final total.
pub fn calculate_points(rules: &[PointsRule], lines: &[PointsLine], total_cents: i64) -> i64 {
    let active = || rules.iter().filter(|r| r.active);

    let per_line: i64 = lines
        .iter()
        .filter(|line| !line.redeemed && line.quantity > 0)
        .map(|line| {
            let product_rule = active().find(|r| {
                r.kind == PointsRuleKind::EarnProduct && r.product_id == Some(line.product_id)
            });
            let rule = product_rule.or_else(|| {
                line.category_id.and_then(|category_id| {
                    active().find(|r| {
                        r.kind == PointsRuleKind::EarnCategory
                            && r.category_id == Some(category_id)
                    })
                })
            });
            rule.map_or(0, |r| r.points.saturating_mul(line.quantity))
        })
        .fold(0i64, i64::saturating_add);

    let threshold = active()
        .filter(|r| r.kind == PointsRuleKind::EarnAmount)
        .filter_map(|r| r.min_amount_cents.map(|min| (min, r.points)))
        .filter(|(min, _)| *min <= total_cents)
        .max_by_key(|(min, _)| *min)
        .map_or(0, |(_, points)| points);

    per_line.saturating_add(threshold)
}

/// Points needed to redeem `product_id`, if the product is redeemable.
pub fn redemption_cost(rules: &[PointsRule], product_id: Uuid) -> Option<i64> {
    rules
        .iter()
        .find(|r| {
            r.active && r.kind == PointsRuleKind::RedeemProduct && r.product_id == Some(product_id)
        })
        .map(|r| r.points)
}
