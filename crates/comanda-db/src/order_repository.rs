//! Orders and the loyalty operations that move points with them.
//!
//! Every operation that reads or changes a customer's balance runs in one
//! transaction and locks the order row first, then the customer row
//! (`SELECT ... FOR UPDATE`), so concurrent redemptions cannot spend the
//! same points twice.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use comanda_core::catalog::Product;
use comanda_core::error::AppError;
use comanda_core::order::{
    Order, OrderDraft, OrderFilter, OrderInput, OrderItem, OrderItemInput, OrderStatus,
    PointsPreview, Redemption, RedemptionRevert,
};
use comanda_core::points::{PointsLine, calculate_points, redemption_cost};
use comanda_core::promotion::Promotion;
use sqlx::{PgConnection, PgPool, Pool, Postgres};
use uuid::Uuid;

use crate::catalog_repository::{PRODUCT_COLUMNS, ProductRow};
use crate::error::{db_err, not_found};
use crate::points_repository::active_rules;
use crate::promotion_repository::{PROMOTION_COLUMNS, PromotionRow};

const ORDER_COLUMNS: &str = "id, customer_id, payment_method_id, promotion_id, status, subtotal_cents, discount_cents, total_cents, points_earned, notes, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price_cents, line_total_cents, redeemed, points_spent";

#[derive(Clone)]
pub struct OrderRepository {
    pool: Pool<Postgres>,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an order, pricing its lines from the catalog. Completed orders
    /// with a customer accrue points immediately.
    pub async fn create(&self, user_id: Uuid, input: &OrderInput) -> Result<Order, AppError> {
        let status = input.initial_status()?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let products = load_products(&mut tx, user_id, &input.items).await?;
        let promotion = match input.promotion_id {
            Some(id) => Some(load_promotion(&mut tx, user_id, id).await?),
            None => None,
        };
        ensure_owned(&mut tx, OwnedTable::Customers, user_id, input.customer_id).await?;
        ensure_owned(&mut tx, OwnedTable::PaymentMethods, user_id, input.payment_method_id).await?;

        let draft = OrderDraft::build(&products, &input.items, promotion.as_ref(), Utc::now())?;

        let (order_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO orders (user_id, customer_id, payment_method_id, promotion_id, status,
                                subtotal_cents, discount_cents, total_cents, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(input.customer_id)
        .bind(input.payment_method_id)
        .bind(input.promotion_id)
        .bind(status.as_str())
        .bind(draft.subtotal_cents)
        .bind(draft.discount_cents)
        .bind(draft.total_cents)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        for line in &draft.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity,
                                         unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        if status == OrderStatus::Completed
            && let Some(customer_id) = input.customer_id
        {
            accrue_points(&mut tx, user_id, order_id, customer_id, draft.total_cents).await?;
        }

        let order = fetch_order(&mut tx, user_id, order_id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            total_cents = order.total_cents,
            points_earned = order.points_earned,
            "Order created"
        );
        Ok(order)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Order, AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        fetch_order(&mut conn, user_id, id).await
    }

    /// Most recent orders first, at most `filter.effective_limit()`.
    pub async fn list(&self, user_id: Uuid, filter: &OrderFilter) -> Result<Vec<Order>, AppError> {
        self.query_orders(user_id, filter, Some(filter.effective_limit()))
            .await
    }

    /// Every order created in `[from, to)`, oldest first.
    pub async fn export(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, AppError> {
        let filter = OrderFilter {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        };
        let mut orders = self.query_orders(user_id, &filter, None).await?;
        orders.reverse();
        Ok(orders)
    }

    async fn query_orders(
        &self,
        user_id: Uuid,
        filter: &OrderFilter,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
            ORDER BY created_at DESC, id
            LIMIT $6
            "#
        ))
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY seq"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }

    /// Move an order to `next`, settling points on the way.
    ///
    /// - open → completed: accrue points for the order.
    /// - open → cancelled: refund points spent on redemptions.
    /// - completed → cancelled: take back earned points and refund redemptions.
    pub async fn update_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let locked = lock_order(&mut tx, user_id, id).await?;

        if !locked.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "Order {} cannot go from {} to {}",
                id, locked.status, next
            )));
        }

        match (locked.status, locked.customer_id) {
            (_, None) => {}
            (OrderStatus::Open, Some(customer_id)) if next == OrderStatus::Completed => {
                accrue_points(&mut tx, user_id, id, customer_id, locked.total_cents).await?;
            }
            (OrderStatus::Open, Some(customer_id)) => {
                let refund = redeemed_points(&mut tx, id).await?;
                move_points(&mut tx, user_id, customer_id, refund).await?;
            }
            (_, Some(customer_id)) => {
                let refund = redeemed_points(&mut tx, id).await?;
                move_points(&mut tx, user_id, customer_id, refund - locked.points_earned).await?;
            }
        }

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let order = fetch_order(&mut tx, user_id, id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!(order_id = %id, from = %locked.status, to = %next, "Order status changed");
        Ok(order)
    }

    /// Delete an order. Completed orders are kept for the books; open orders
    /// give redeemed points back first.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let locked = lock_order(&mut tx, user_id, id).await?;

        match locked.status {
            OrderStatus::Completed => {
                return Err(AppError::Conflict(format!(
                    "Order {id} is completed and cannot be deleted; cancel it instead"
                )));
            }
            OrderStatus::Open => {
                if let Some(customer_id) = locked.customer_id {
                    let refund = redeemed_points(&mut tx, id).await?;
                    move_points(&mut tx, user_id, customer_id, refund).await?;
                }
            }
            OrderStatus::Cancelled => {}
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }

    /// Price a prospective order and compute the points it would earn.
    pub async fn preview(
        &self,
        user_id: Uuid,
        items: &[OrderItemInput],
        promotion_id: Option<Uuid>,
    ) -> Result<PointsPreview, AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;

        let products = load_products(&mut conn, user_id, items).await?;
        let promotion = match promotion_id {
            Some(id) => Some(load_promotion(&mut conn, user_id, id).await?),
            None => None,
        };
        let draft = OrderDraft::build(&products, items, promotion.as_ref(), Utc::now())?;
        let rules = active_rules(&mut *conn, user_id).await?;

        Ok(PointsPreview {
            subtotal_cents: draft.subtotal_cents,
            discount_cents: draft.discount_cents,
            total_cents: draft.total_cents,
            points: calculate_points(&rules, &draft.points_lines(), draft.total_cents),
        })
    }

    /// Pay for one unit of `product_id` with the order customer's points.
    pub async fn redeem(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        product_id: Uuid,
    ) -> Result<Redemption, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let locked = lock_order(&mut tx, user_id, order_id).await?;

        if locked.status != OrderStatus::Open {
            return Err(AppError::Conflict(format!(
                "Order {order_id} is {}; only open orders accept redemptions",
                locked.status
            )));
        }
        let customer_id = locked.customer_id.ok_or_else(|| {
            AppError::ValidationError(format!("Order {order_id} has no customer"))
        })?;

        let rules = active_rules(&mut *tx, user_id).await?;
        let cost = redemption_cost(&rules, product_id).ok_or_else(|| {
            AppError::ValidationError(format!("Product {product_id} cannot be redeemed with points"))
        })?;

        let product: Product = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND user_id = $2"
        ))
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| not_found("Product", product_id))?
        .into();

        let balance = lock_balance(&mut tx, user_id, customer_id).await?;
        if balance < cost {
            return Err(AppError::InsufficientPoints {
                required: cost,
                available: balance,
            });
        }
        let remaining = set_balance(&mut tx, customer_id, balance - cost).await?;

        let item: OrderItem = sqlx::query_as::<_, OrderItemRow>(&format!(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity,
                                     unit_price_cents, line_total_cents, redeemed, points_spent)
            VALUES ($1, $2, $3, 1, 0, 0, TRUE, $4)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(product.id)
        .bind(&product.name)
        .bind(cost)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?
        .into();

        touch_order(&mut tx, order_id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!(order_id = %order_id, customer_id = %customer_id, cost, remaining, "Product redeemed");
        Ok(Redemption {
            item,
            customer_id,
            points_spent: cost,
            remaining_points: remaining,
        })
    }

    /// Undo a redemption on an open order: refund its points and drop the line.
    pub async fn revert_redemption(
        &self,
        user_id: Uuid,
        order_item_id: Uuid,
    ) -> Result<RedemptionRevert, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let line: Option<(Uuid, bool, i64)> = sqlx::query_as(
            r#"
            SELECT oi.order_id, oi.redeemed, oi.points_spent
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.id = $1 AND o.user_id = $2
            "#,
        )
        .bind(order_item_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let (order_id, redeemed, points_spent) =
            line.ok_or_else(|| not_found("Order item", order_item_id))?;
        if !redeemed {
            return Err(AppError::ValidationError(format!(
                "Order item {order_item_id} was not redeemed with points"
            )));
        }

        let locked = lock_order(&mut tx, user_id, order_id).await?;
        if locked.status != OrderStatus::Open {
            return Err(AppError::Conflict(format!(
                "Order {order_id} is {}; redemptions can only be reverted on open orders",
                locked.status
            )));
        }
        let customer_id = locked.customer_id.ok_or_else(|| {
            AppError::ValidationError(format!("Order {order_id} has no customer"))
        })?;

        let balance = lock_balance(&mut tx, user_id, customer_id).await?;
        let remaining =
            set_balance(&mut tx, customer_id, balance.saturating_add(points_spent)).await?;

        sqlx::query("DELETE FROM order_items WHERE id = $1")
            .bind(order_item_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        touch_order(&mut tx, order_id).await?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!(order_id = %order_id, customer_id = %customer_id, points_spent, remaining, "Redemption reverted");
        Ok(RedemptionRevert {
            order_item_id,
            customer_id,
            refunded_points: points_spent,
            remaining_points: remaining,
        })
    }
}

// -- Transaction helpers --

enum OwnedTable {
    Customers,
    PaymentMethods,
}

/// Reject references to rows of another tenant.
async fn ensure_owned(
    conn: &mut PgConnection,
    table: OwnedTable,
    user_id: Uuid,
    id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(id) = id else {
        return Ok(());
    };
    let (sql, what) = match table {
        OwnedTable::Customers => ("SELECT id FROM customers WHERE id = $1 AND user_id = $2", "customer"),
        OwnedTable::PaymentMethods => (
            "SELECT id FROM payment_methods WHERE id = $1 AND user_id = $2",
            "payment method",
        ),
    };
    let found: Option<(Uuid,)> = sqlx::query_as(sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

    if found.is_none() {
        return Err(AppError::ValidationError(format!("Unknown {what}: {id}")));
    }
    Ok(())
}

async fn load_products(
    conn: &mut PgConnection,
    user_id: Uuid,
    items: &[OrderItemInput],
) -> Result<Vec<Product>, AppError> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE user_id = $1 AND id = ANY($2)"
    ))
    .bind(user_id)
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

async fn load_promotion(
    conn: &mut PgConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<Promotion, AppError> {
    let row = sqlx::query_as::<_, PromotionRow>(&format!(
        "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    row.map(Into::into)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown promotion: {id}")))
}

async fn fetch_order(conn: &mut PgConnection, user_id: Uuid, id: Uuid) -> Result<Order, AppError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or_else(|| not_found("Order", id))?;

    let items = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY seq"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(row.into_order(items.into_iter().map(Into::into).collect()))
}

struct LockedOrder {
    status: OrderStatus,
    customer_id: Option<Uuid>,
    total_cents: i64,
    points_earned: i64,
}

async fn lock_order(conn: &mut PgConnection, user_id: Uuid, id: Uuid) -> Result<LockedOrder, AppError> {
    let row: Option<(String, Option<Uuid>, i64, i64)> = sqlx::query_as(
        r#"
        SELECT status, customer_id, total_cents, points_earned
        FROM orders
        WHERE id = $1 AND user_id = $2
        FOR UPDATE
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    let (status, customer_id, total_cents, points_earned) =
        row.ok_or_else(|| not_found("Order", id))?;
    let status = status
        .parse()
        .map_err(|e: String| AppError::DatabaseError(e))?;

    Ok(LockedOrder {
        status,
        customer_id,
        total_cents,
        points_earned,
    })
}

async fn touch_order(conn: &mut PgConnection, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE orders SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn lock_balance(conn: &mut PgConnection, user_id: Uuid, customer_id: Uuid) -> Result<i64, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT points FROM customers WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(customer_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    row.map(|(points,)| points)
        .ok_or_else(|| not_found("Customer", customer_id))
}

async fn set_balance(conn: &mut PgConnection, customer_id: Uuid, points: i64) -> Result<i64, AppError> {
    let (points,): (i64,) = sqlx::query_as(
        "UPDATE customers SET points = $2, updated_at = NOW() WHERE id = $1 RETURNING points",
    )
    .bind(customer_id)
    .bind(points)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(points)
}

/// Apply `delta` to a customer's balance, never going below zero.
async fn move_points(
    conn: &mut PgConnection,
    user_id: Uuid,
    customer_id: Uuid,
    delta: i64,
) -> Result<i64, AppError> {
    let balance = lock_balance(conn, user_id, customer_id).await?;
    if delta == 0 {
        return Ok(balance);
    }
    let target = balance.saturating_add(delta);
    if target < 0 {
        tracing::warn!(
            customer_id = %customer_id,
            balance,
            delta,
            "Points already spent; balance clamped to zero"
        );
    }
    set_balance(conn, customer_id, target.max(0)).await
}

async fn redeemed_points(conn: &mut PgConnection, order_id: Uuid) -> Result<i64, AppError> {
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(points_spent), 0)::BIGINT FROM order_items WHERE order_id = $1 AND redeemed",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(total)
}

/// Credit the points an order earns and record them on the order.
async fn accrue_points(
    conn: &mut PgConnection,
    user_id: Uuid,
    order_id: Uuid,
    customer_id: Uuid,
    total_cents: i64,
) -> Result<i64, AppError> {
    let lines: Vec<(Option<Uuid>, Option<Uuid>, i32, bool)> = sqlx::query_as(
        r#"
        SELECT oi.product_id, p.category_id, oi.quantity, oi.redeemed
        FROM order_items oi
        LEFT JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    let lines: Vec<PointsLine> = lines
        .into_iter()
        .filter_map(|(product_id, category_id, quantity, redeemed)| {
            product_id.map(|product_id| PointsLine {
                product_id,
                category_id,
                quantity: i64::from(quantity),
                redeemed,
            })
        })
        .collect();

    let rules = active_rules(&mut *conn, user_id).await?;
    let points = calculate_points(&rules, &lines, total_cents);
    if points == 0 {
        return Ok(0);
    }

    move_points(conn, user_id, customer_id, points).await?;
    sqlx::query("UPDATE orders SET points_earned = $2 WHERE id = $1")
        .bind(order_id)
        .bind(points)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    tracing::debug!(order_id = %order_id, customer_id = %customer_id, points, "Points accrued");
    Ok(points)
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Option<Uuid>,
    payment_method_id: Option<Uuid>,
    promotion_id: Option<Uuid>,
    status: String,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    points_earned: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id,
            payment_method_id: self.payment_method_id,
            promotion_id: self.promotion_id,
            status: self.status.parse().unwrap_or(OrderStatus::Open),
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            total_cents: self.total_cents,
            points_earned: self.points_earned,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Option<Uuid>,
    product_name: String,
    quantity: i32,
    unit_price_cents: i64,
    line_total_cents: i64,
    redeemed: bool,
    points_spent: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
            redeemed: row.redeemed,
            points_spent: row.points_spent,
        }
    }
}
