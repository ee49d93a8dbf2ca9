use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comanda_core::bot::{BotStatus, UserBot};
use comanda_core::order::{Order, OrderItemInput, OrderStatus};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    /// At least 8 characters
    pub password: String,
    pub business_name: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Catalog & customers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListProductsQuery {
    pub category_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListCustomersQuery {
    /// Case-insensitive match on name, phone, or email
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListPromotionsQuery {
    #[serde(default)]
    pub active_only: bool,
}

// ---------------------------------------------------------------------------
// Orders & rewards
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Defaults to 50, at most 100
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub total: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PreviewRequest {
    pub items: Vec<OrderItemInput>,
    pub promotion_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RedeemRequest {
    pub order_id: Uuid,
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RevertRedeemRequest {
    pub order_item_id: Uuid,
}

// ---------------------------------------------------------------------------
// Expenses & reports
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListExpensesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SalesReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ---------------------------------------------------------------------------
// Chatbot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BotConfigResponse {
    pub bot: UserBot,
    /// Whether the server has an LLM key; AI replies need it and `ai_enabled`.
    pub ai_available: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QrResponse {
    pub status: BotStatus,
    pub qr_code: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ManualReplyRequest {
    pub text: String,
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

/// Event pushed by the WhatsApp gateway.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WebhookEvent {
    /// `message` or `session.status`; other events are acknowledged and ignored
    pub event: String,
    pub session: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    pub from: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "_data", default)]
    pub data: Option<serde_json::Value>,
}

impl WebhookMessage {
    /// WhatsApp display name of the sender, when the gateway passes it along.
    pub fn contact_name(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get("notifyName"))
            .and_then(|n| n.as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookStatus {
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WebhookAck {
    /// `processed`, `ignored`, or `failed`
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
