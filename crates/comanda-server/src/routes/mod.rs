//! HTTP routes, one module per area of the dashboard.

pub mod account;
pub mod catalog;
pub mod chatbot;
pub mod customers;
pub mod expenses;
pub mod health;
pub mod orders;
pub mod payments;
pub mod promotions;
pub mod reports;
pub mod rewards;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, patch, post, put};
use tower_cookies::CookieManagerLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::require_session;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/auth/me", get(account::me))
        // Catalog
        .route(
            "/api/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/api/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        .route(
            "/api/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/api/products/{id}",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        // Customers
        .route(
            "/api/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/api/customers/{id}",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route("/api/customers/{id}/points", post(customers::adjust_points))
        // Payment methods & promotions
        .route(
            "/api/payment-methods",
            get(payments::list_payment_methods).post(payments::create_payment_method),
        )
        .route(
            "/api/payment-methods/{id}",
            put(payments::update_payment_method)
                .delete(payments::delete_payment_method),
        )
        .route(
            "/api/promotions",
            get(promotions::list_promotions).post(promotions::create_promotion),
        )
        .route(
            "/api/promotions/{id}",
            get(promotions::get_promotion)
                .put(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        )
        // Orders & rewards
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route(
            "/api/orders/{id}",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/api/orders/{id}/status", patch(orders::update_order_status))
        .route(
            "/api/rewards/config",
            get(rewards::list_rules).post(rewards::create_rule),
        )
        .route(
            "/api/rewards/config/{id}",
            put(rewards::update_rule).delete(rewards::delete_rule),
        )
        .route("/api/rewards/preview", post(rewards::preview))
        .route("/api/rewards/redeem", post(rewards::redeem))
        .route("/api/rewards/revert", post(rewards::revert))
        // Suppliers & expenses
        .route(
            "/api/suppliers",
            get(expenses::list_suppliers).post(expenses::create_supplier),
        )
        .route(
            "/api/suppliers/{id}",
            get(expenses::get_supplier)
                .put(expenses::update_supplier)
                .delete(expenses::delete_supplier),
        )
        .route(
            "/api/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route("/api/expenses/summary", get(expenses::expense_summary))
        .route(
            "/api/expenses/{id}",
            get(expenses::get_expense)
                .put(expenses::update_expense)
                .delete(expenses::delete_expense),
        )
        .route("/api/reports/sales", get(reports::sales_report))
        // Chatbot
        .route(
            "/api/chatbot/config",
            get(chatbot::get_config).put(chatbot::update_config),
        )
        .route("/api/chatbot/start", post(chatbot::start_bot))
        .route("/api/chatbot/stop", post(chatbot::stop_bot))
        .route("/api/chatbot/qr", get(chatbot::get_qr))
        .route(
            "/api/chatbot/rules",
            get(chatbot::list_rules).post(chatbot::create_rule),
        )
        .route(
            "/api/chatbot/rules/{id}",
            put(chatbot::update_rule).delete(chatbot::delete_rule),
        )
        .route(
            "/api/chatbot/conversations",
            get(chatbot::list_conversations),
        )
        .route(
            "/api/chatbot/conversations/{id}/messages",
            get(chatbot::list_messages),
        )
        .route(
            "/api/chatbot/conversations/{id}/reply",
            post(chatbot::reply),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let public = Router::new()
        .route("/api/auth/register", post(account::register))
        .route("/api/auth/login", post(account::login))
        .route("/api/auth/logout", post(account::logout))
        .route("/webhooks/whatsapp", post(webhook::whatsapp_webhook))
        .route("/health", get(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public
        .merge(api)
        .with_state(state)
        .layer(CookieManagerLayer::new())
}
