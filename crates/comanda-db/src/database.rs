use comanda_core::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::bot_repository::BotRepository;
use crate::catalog_repository::CatalogRepository;
use crate::config::DatabaseConfig;
use crate::customer_repository::CustomerRepository;
use crate::error::db_err;
use crate::expense_repository::ExpenseRepository;
use crate::order_repository::OrderRepository;
use crate::payment_repository::PaymentMethodRepository;
use crate::points_repository::PointsRuleRepository;
use crate::promotion_repository::PromotionRepository;
use crate::report_repository::ReportRepository;
use crate::user_repository::UserRepository;

/// Owns the connection pool, runs migrations, and vends repositories.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn catalog_repo(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn customer_repo(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn payment_repo(&self) -> PaymentMethodRepository {
        PaymentMethodRepository::new(self.pool.clone())
    }

    pub fn promotion_repo(&self) -> PromotionRepository {
        PromotionRepository::new(self.pool.clone())
    }

    pub fn points_repo(&self) -> PointsRuleRepository {
        PointsRuleRepository::new(self.pool.clone())
    }

    pub fn order_repo(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn expense_repo(&self) -> ExpenseRepository {
        ExpenseRepository::new(self.pool.clone())
    }

    pub fn report_repo(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Bot repository; also the [`BotStore`](comanda_core::BotStore) for the chatbot.
    pub fn bot_repo(&self) -> BotRepository {
        BotRepository::new(self.pool.clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
