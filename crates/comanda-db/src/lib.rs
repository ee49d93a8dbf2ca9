pub mod bot_repository;
pub mod catalog_repository;
pub mod config;
pub mod customer_repository;
pub mod database;
mod error;
pub mod expense_repository;
pub mod order_repository;
pub mod payment_repository;
pub mod points_repository;
pub mod promotion_repository;
pub mod report_repository;
pub mod user_repository;

pub use bot_repository::BotRepository;
pub use catalog_repository::CatalogRepository;
pub use config::DatabaseConfig;
pub use customer_repository::CustomerRepository;
pub use database::Database;
pub use expense_repository::ExpenseRepository;
pub use order_repository::OrderRepository;
pub use payment_repository::PaymentMethodRepository;
pub use points_repository::PointsRuleRepository;
pub use promotion_repository::PromotionRepository;
pub use report_repository::ReportRepository;
pub use user_repository::UserRepository;
