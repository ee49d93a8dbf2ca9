use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

use crate::auth::SESSION_COOKIE;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Comanda API",
        version = "0.1.0",
        description = "Restaurant point of sale with loyalty points and a WhatsApp chatbot."
    ),
    paths(
        crate::routes::account::register,
        crate::routes::account::login,
        crate::routes::account::logout,
        crate::routes::account::me,
        crate::routes::catalog::list_categories,
        crate::routes::catalog::create_category,
        crate::routes::catalog::update_category,
        crate::routes::catalog::delete_category,
        crate::routes::catalog::list_products,
        crate::routes::catalog::get_product,
        crate::routes::catalog::create_product,
        crate::routes::catalog::update_product,
        crate::routes::catalog::delete_product,
        crate::routes::customers::list_customers,
        crate::routes::customers::get_customer,
        crate::routes::customers::create_customer,
        crate::routes::customers::update_customer,
        crate::routes::customers::delete_customer,
        crate::routes::customers::adjust_points,
        crate::routes::payments::list_payment_methods,
        crate::routes::payments::create_payment_method,
        crate::routes::payments::update_payment_method,
        crate::routes::payments::delete_payment_method,
        crate::routes::promotions::list_promotions,
        crate::routes::promotions::get_promotion,
        crate::routes::promotions::create_promotion,
        crate::routes::promotions::update_promotion,
        crate::routes::promotions::delete_promotion,
        crate::routes::orders::list_orders,
        crate::routes::orders::create_order,
        crate::routes::orders::get_order,
        crate::routes::orders::update_order_status,
        crate::routes::orders::delete_order,
        crate::routes::rewards::list_rules,
        crate::routes::rewards::create_rule,
        crate::routes::rewards::update_rule,
        crate::routes::rewards::delete_rule,
        crate::routes::rewards::preview,
        crate::routes::rewards::redeem,
        crate::routes::rewards::revert,
        crate::routes::expenses::list_suppliers,
        crate::routes::expenses::get_supplier,
        crate::routes::expenses::create_supplier,
        crate::routes::expenses::update_supplier,
        crate::routes::expenses::delete_supplier,
        crate::routes::expenses::list_expenses,
        crate::routes::expenses::expense_summary,
        crate::routes::expenses::get_expense,
        crate::routes::expenses::create_expense,
        crate::routes::expenses::update_expense,
        crate::routes::expenses::delete_expense,
        crate::routes::reports::sales_report,
        crate::routes::chatbot::get_config,
        crate::routes::chatbot::update_config,
        crate::routes::chatbot::start_bot,
        crate::routes::chatbot::stop_bot,
        crate::routes::chatbot::get_qr,
        crate::routes::chatbot::list_rules,
        crate::routes::chatbot::create_rule,
        crate::routes::chatbot::update_rule,
        crate::routes::chatbot::delete_rule,
        crate::routes::chatbot::list_conversations,
        crate::routes::chatbot::list_messages,
        crate::routes::chatbot::reply,
        crate::routes::webhook::whatsapp_webhook,
        crate::routes::health::health,
    ),
    components(schemas(
        crate::dto::RegisterRequest,
        crate::dto::LoginRequest,
        crate::dto::OrderListResponse,
        crate::dto::UpdateOrderStatusRequest,
        crate::dto::PreviewRequest,
        crate::dto::RedeemRequest,
        crate::dto::RevertRedeemRequest,
        crate::dto::BotConfigResponse,
        crate::dto::QrResponse,
        crate::dto::ManualReplyRequest,
        crate::dto::WebhookEvent,
        crate::dto::WebhookAck,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
        crate::auth::CurrentUser,
    )),
    tags(
        (name = "auth", description = "Registration and cookie sessions"),
        (name = "catalog", description = "Categories and products"),
        (name = "customers", description = "Customers and points balances"),
        (name = "payment_methods", description = "Accepted payment methods"),
        (name = "promotions", description = "Discounts applied to orders"),
        (name = "orders", description = "Orders and their lifecycle"),
        (name = "rewards", description = "Points rules, previews, and redemptions"),
        (name = "expenses", description = "Suppliers and expenses"),
        (name = "reports", description = "Sales reporting"),
        (name = "chatbot", description = "WhatsApp bot, automation rules, and conversations"),
        (name = "webhooks", description = "Gateway callbacks"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the session cookie security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    SESSION_COOKIE,
                    "Session cookie set by /api/auth/register and /api/auth/login.",
                ))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/orders"));
        assert!(doc.paths.paths.contains_key("/api/rewards/redeem"));
        assert!(doc.paths.paths.contains_key("/webhooks/whatsapp"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("session"));
    }
}
