use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Product;
use crate::error::AppError;
use crate::points::PointsLine;
use crate::promotion::Promotion;

/// Lifecycle of an order.
///
/// ```text
/// open ──> completed ──> cancelled
///   └────────────────────────^
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Open, OrderStatus::Completed)
                | (OrderStatus::Open, OrderStatus::Cancelled)
                | (OrderStatus::Completed, OrderStatus::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(OrderStatus::Open),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    /// `None` once the product has been deleted; the name is a snapshot.
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub redeemed: bool,
    pub points_spent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub promotion_id: Option<Uuid>,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub points_earned: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Points spent on redeemed lines that must go back to the customer if
    /// the order is cancelled or deleted.
    pub fn redeemed_points(&self) -> i64 {
        self.items
            .iter()
            .filter(|i| i.redeemed)
            .map(|i| i.points_spent)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Request to create an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderInput {
    pub items: Vec<OrderItemInput>,
    pub customer_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub promotion_id: Option<Uuid>,
    /// Defaults to `completed`: most POS orders are paid on the spot.
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

impl OrderInput {
    pub fn initial_status(&self) -> Result<OrderStatus, AppError> {
        match self.status.unwrap_or(OrderStatus::Completed) {
            OrderStatus::Cancelled => Err(AppError::ValidationError(
                "Orders cannot be created as cancelled".into(),
            )),
            status => Ok(status),
        }
    }
}

pub const DEFAULT_ORDER_LIMIT: i64 = 50;
pub const MAX_ORDER_LIMIT: i64 = 100;

/// Filters for listing orders. Time bounds are half-open: `[from, to)`.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderFilter {
    /// Requested page size clamped to `1..=MAX_ORDER_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ORDER_LIMIT)
            .clamp(1, MAX_ORDER_LIMIT)
    }
}

/// A priced order line, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftLine {
    pub product_id: Uuid,
    pub category_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// Priced lines and totals for an order that has not been saved yet.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub lines: Vec<DraftLine>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

fn too_large(product: &str) -> AppError {
    AppError::ValidationError(format!("Order line for '{product}' is too large"))
}

impl OrderDraft {
    /// Price `items` against the tenant's `products` and apply `promotion`.
    ///
    /// Every product must be present in `products` and active; quantities
    /// must be positive and there must be at least one item.
    pub fn build(
        products: &[Product],
        items: &[OrderItemInput],
        promotion: Option<&Promotion>,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        if items.is_empty() {
            return Err(AppError::ValidationError(
                "An order needs at least one item".into(),
            ));
        }

        let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

        let lines = items
            .iter()
            .map(|item| {
                if item.quantity <= 0 {
                    return Err(AppError::ValidationError(format!(
                        "Invalid quantity {} for product {}: must be positive",
                        item.quantity, item.product_id
                    )));
                }
                let product = by_id.get(&item.product_id).ok_or_else(|| {
                    AppError::ValidationError(format!("Unknown product: {}", item.product_id))
                })?;
                if !product.active {
                    return Err(AppError::ValidationError(format!(
                        "Product '{}' is not active",
                        product.name
                    )));
                }
                let line_total_cents = product
                    .price_cents
                    .checked_mul(i64::from(item.quantity))
                    .ok_or_else(|| too_large(&product.name))?;
                Ok(DraftLine {
                    product_id: product.id,
                    category_id: product.category_id,
                    product_name: product.name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: product.price_cents,
                    line_total_cents,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let subtotal_cents = lines
            .iter()
            .try_fold(0i64, |acc, l| acc.checked_add(l.line_total_cents))
            .ok_or_else(|| AppError::ValidationError("Order total is too large".into()))?;
        let discount_cents = promotion.map_or(0, |p| p.discount_for(subtotal_cents, now));

        Ok(Self {
            lines,
            subtotal_cents,
            discount_cents,
            total_cents: subtotal_cents - discount_cents,
        })
    }

    pub fn points_lines(&self) -> Vec<PointsLine> {
        self.lines
            .iter()
            .map(|l| PointsLine {
                product_id: l.product_id,
                category_id: l.category_id,
                quantity: i64::from(l.quantity),
                redeemed: false,
            })
            .collect()
    }
}

/// Result of the `points-calc` preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PointsPreview {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub points: i64,
}

/// Result of redeeming a product for points on an open order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Redemption {
    pub item: OrderItem,
    pub customer_id: Uuid,
    pub points_spent: i64,
    pub remaining_points: i64,
}

/// Result of reverting a redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RedemptionRevert {
    pub order_item_id: Uuid,
    pub customer_id: Uuid,
    pub refunded_points: i64,
    pub remaining_points: i64,
}
