use chrono::NaiveDate;
use comanda_core::error::AppError;
use comanda_core::report::{SalesSummary, TopProduct, day_range};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::error::db_err;

const TOP_PRODUCTS: i64 = 5;

#[derive(Clone)]
pub struct ReportRepository {
    pool: Pool<Postgres>,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Completed-order totals for the days `from..=to` (UTC).
    pub async fn sales_summary(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<SalesSummary, AppError> {
        let (start, end) = day_range(from, to)?;

        let (order_count, revenue_cents, discount_cents, points_issued): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(total_cents), 0)::BIGINT,
                       COALESCE(SUM(discount_cents), 0)::BIGINT,
                       COALESCE(SUM(points_earned), 0)::BIGINT
                FROM orders
                WHERE user_id = $1 AND status = 'completed'
                  AND created_at >= $2 AND created_at < $3
                "#,
            )
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let top: Vec<(Uuid, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT oi.product_id, MAX(oi.product_name),
                   SUM(oi.quantity)::BIGINT AS quantity,
                   SUM(oi.line_total_cents)::BIGINT
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.user_id = $1 AND o.status = 'completed'
              AND o.created_at >= $2 AND o.created_at < $3
              AND oi.product_id IS NOT NULL AND NOT oi.redeemed
            GROUP BY oi.product_id
            ORDER BY quantity DESC, MAX(oi.product_name)
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(TOP_PRODUCTS)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(SalesSummary {
            from,
            to,
            order_count,
            revenue_cents,
            discount_cents,
            points_issued,
            top_products: top
                .into_iter()
                .map(|(product_id, product_name, quantity, revenue_cents)| TopProduct {
                    product_id,
                    product_name,
                    quantity,
                    revenue_cents,
                })
                .collect(),
        })
    }
}
