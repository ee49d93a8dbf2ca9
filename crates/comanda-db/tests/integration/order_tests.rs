use chrono::{TimeDelta, Utc};
use comanda_core::error::AppError;
use comanda_core::order::{OrderFilter, OrderInput, OrderItemInput, OrderStatus};
use comanda_core::points::PointsRuleKind;
use comanda_core::promotion::{DiscountKind, PromotionInput};
use uuid::Uuid;

use crate::integration::common::{
    seed_customer, seed_product, seed_rule, seed_user, setup_test_db,
};

fn order_input(
    items: &[(Uuid, i32)],
    customer_id: Option<Uuid>,
    status: Option<OrderStatus>,
) -> OrderInput {
    OrderInput {
        items: items
            .iter()
            .map(|&(product_id, quantity)| OrderItemInput {
                product_id,
                quantity,
            })
            .collect(),
        customer_id,
        payment_method_id: None,
        promotion_id: None,
        status,
        notes: None,
    }
}

#[tokio::test]
async fn completed_order_accrues_points() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::EarnProduct, Some(taco.id), None, 2).await;
    seed_rule(&db, user.id, PointsRuleKind::EarnAmount, None, Some(1000), 5).await;

    let order = db
        .order_repo()
        .create(user.id, &order_input(&[(taco.id, 3)], Some(customer.id), None))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.subtotal_cents, 1350);
    assert_eq!(order.total_cents, 1350);
    assert_eq!(order.points_earned, 11);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].product_name, "Taco");

    let customer = db.customer_repo().get(user.id, customer.id).await.unwrap();
    assert_eq!(customer.points, 11);
}

#[tokio::test]
async fn open_order_accrues_on_completion() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::EarnProduct, Some(taco.id), None, 2).await;

    let repo = db.order_repo();
    let order = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 2)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();
    assert_eq!(order.points_earned, 0);
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 0);

    let completed = repo
        .update_status(user.id, order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.points_earned, 4);
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 4);

    // Completed orders never reopen
    let err = repo
        .update_status(user.id, order.id, OrderStatus::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn promotion_discount_applies_to_total() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let burrito = seed_product(&db, user.id, "Burrito", 1000).await;

    let promotion = db
        .promotion_repo()
        .create(
            user.id,
            &PromotionInput {
                name: "Happy hour".into(),
                description: None,
                discount_kind: DiscountKind::Percent,
                discount_value: 10,
                starts_at: Some(Utc::now() - TimeDelta::hours(1)),
                ends_at: None,
                active: true,
            },
        )
        .await
        .unwrap();

    let mut input = order_input(&[(burrito.id, 2)], None, None);
    input.promotion_id = Some(promotion.id);
    let order = db.order_repo().create(user.id, &input).await.unwrap();

    assert_eq!(order.subtotal_cents, 2000);
    assert_eq!(order.discount_cents, 200);
    assert_eq!(order.total_cents, 1800);
}

#[tokio::test]
async fn preview_matches_created_order() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    seed_rule(&db, user.id, PointsRuleKind::EarnProduct, Some(taco.id), None, 3).await;

    let items = [OrderItemInput {
        product_id: taco.id,
        quantity: 4,
    }];
    let preview = db.order_repo().preview(user.id, &items, None).await.unwrap();

    assert_eq!(preview.total_cents, 1800);
    assert_eq!(preview.points, 12);
}

#[tokio::test]
async fn unknown_product_is_rejected() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;

    let err = db
        .order_repo()
        .create(user.id, &order_input(&[(Uuid::new_v4(), 1)], None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_) | AppError::NotFound(_)));
}

#[tokio::test]
async fn other_tenant_customer_is_rejected() {
    let (db, _container) = setup_test_db().await;
    let owner = seed_user(&db, "owner@cantina.test").await;
    let other = seed_user(&db, "other@cantina.test").await;
    let taco = seed_product(&db, owner.id, "Taco", 450).await;
    let stranger = seed_customer(&db, other.id, "Bea", "5511977776666").await;

    let err = db
        .order_repo()
        .create(owner.id, &order_input(&[(taco.id, 1)], Some(stranger.id), None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    // Tenants never see each other's orders
    let order = db
        .order_repo()
        .create(owner.id, &order_input(&[(taco.id, 1)], None, None))
        .await
        .unwrap();
    let err = db.order_repo().get(other.id, order.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn redeem_spends_points_and_revert_refunds_them() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let churro = seed_product(&db, user.id, "Churro", 300).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::RedeemProduct, Some(churro.id), None, 10).await;
    db.customer_repo()
        .adjust_points(user.id, customer.id, 25, Some("welcome gift"))
        .await
        .unwrap();

    let repo = db.order_repo();
    let order = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();

    let redemption = repo.redeem(user.id, order.id, churro.id).await.unwrap();
    assert_eq!(redemption.points_spent, 10);
    assert_eq!(redemption.remaining_points, 15);
    assert!(redemption.item.redeemed);
    assert_eq!(redemption.item.line_total_cents, 0);

    let order = repo.get(user.id, order.id).await.unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_cents, 450);

    let revert = repo
        .revert_redemption(user.id, redemption.item.id)
        .await
        .unwrap();
    assert_eq!(revert.refunded_points, 10);
    assert_eq!(revert.remaining_points, 25);

    let order = repo.get(user.id, order.id).await.unwrap();
    assert_eq!(order.items.len(), 1);

    // A regular line cannot be reverted
    let err = repo
        .revert_redemption(user.id, order.items[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn redeem_with_insufficient_points_fails() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let churro = seed_product(&db, user.id, "Churro", 300).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::RedeemProduct, Some(churro.id), None, 10).await;
    db.customer_repo()
        .adjust_points(user.id, customer.id, 4, None)
        .await
        .unwrap();

    let repo = db.order_repo();
    let order = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();

    let err = repo.redeem(user.id, order.id, churro.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientPoints {
            required: 10,
            available: 4
        }
    ));

    let customer = db.customer_repo().get(user.id, customer.id).await.unwrap();
    assert_eq!(customer.points, 4);
    assert_eq!(repo.get(user.id, order.id).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn redeem_requires_open_order_and_redeemable_product() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;

    let repo = db.order_repo();
    let open = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();
    let err = repo.redeem(user.id, open.id, taco.id).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let completed = repo
        .create(user.id, &order_input(&[(taco.id, 1)], Some(customer.id), None))
        .await
        .unwrap();
    let err = repo.redeem(user.id, completed.id, taco.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn cancelling_open_order_refunds_redemptions() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let churro = seed_product(&db, user.id, "Churro", 300).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    seed_rule(&db, user.id, PointsRuleKind::RedeemProduct, Some(churro.id), None, 10).await;
    db.customer_repo()
        .adjust_points(user.id, customer.id, 30, None)
        .await
        .unwrap();

    let repo = db.order_repo();
    let order = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();
    repo.redeem(user.id, order.id, churro.id).await.unwrap();
    repo.redeem(user.id, order.id, churro.id).await.unwrap();
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 10);

    let cancelled = repo
        .update_status(user.id, order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 30);
}

#[tokio::test]
async fn concurrent_redemptions_cannot_double_spend() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let churro = seed_product(&db, user.id, "Churro", 300).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::RedeemProduct, Some(churro.id), None, 10).await;
    db.customer_repo()
        .adjust_points(user.id, customer.id, 15, None)
        .await
        .unwrap();

    // Two tables for the same customer, so only the customer row serializes them
    let repo = db.order_repo();
    let mut orders = Vec::new();
    for _ in 0..2 {
        let order = repo
            .create(
                user.id,
                &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
            )
            .await
            .unwrap();
        orders.push(order.id);
    }

    let (first_repo, second_repo) = (db.order_repo(), db.order_repo());
    let (first, second) = tokio::join!(
        first_repo.redeem(user.id, orders[0], churro.id),
        second_repo.redeem(user.id, orders[1], churro.id),
    );

    let results = [first, second];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(AppError::InsufficientPoints {
                    required: 10,
                    available: 5
                })
            )
        })
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(short, 1);

    let customer = db.customer_repo().get(user.id, customer.id).await.unwrap();
    assert_eq!(customer.points, 5);
}

#[tokio::test]
async fn deleting_open_order_refunds_redemptions() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let churro = seed_product(&db, user.id, "Churro", 300).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::RedeemProduct, Some(churro.id), None, 10).await;
    db.customer_repo()
        .adjust_points(user.id, customer.id, 12, None)
        .await
        .unwrap();

    let repo = db.order_repo();
    let order = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();
    repo.redeem(user.id, order.id, churro.id).await.unwrap();
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 2);

    repo.delete(user.id, order.id).await.unwrap();

    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 12);
    let err = repo.get(user.id, order.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn cancelled_order_cannot_be_completed() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::EarnProduct, Some(taco.id), None, 5).await;

    let repo = db.order_repo();
    let order = repo
        .create(
            user.id,
            &order_input(&[(taco.id, 1)], Some(customer.id), Some(OrderStatus::Open)),
        )
        .await
        .unwrap();
    repo.update_status(user.id, order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let err = repo
        .update_status(user.id, order.id, OrderStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let order = repo.get(user.id, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.points_earned, 0);
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 0);
}

#[tokio::test]
async fn cancelling_completed_order_takes_back_earned_points() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let customer = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    seed_rule(&db, user.id, PointsRuleKind::EarnProduct, Some(taco.id), None, 5).await;

    let repo = db.order_repo();
    let order = repo
        .create(user.id, &order_input(&[(taco.id, 2)], Some(customer.id), None))
        .await
        .unwrap();
    assert_eq!(db.customer_repo().get(user.id, customer.id).await.unwrap().points, 10);

    // Spend part of the earned points elsewhere, then cancel
    db.customer_repo()
        .adjust_points(user.id, customer.id, -7, None)
        .await
        .unwrap();
    repo.update_status(user.id, order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let customer = db.customer_repo().get(user.id, customer.id).await.unwrap();
    assert_eq!(customer.points, 0);
}

#[tokio::test]
async fn completed_orders_cannot_be_deleted() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;

    let repo = db.order_repo();
    let completed = repo
        .create(user.id, &order_input(&[(taco.id, 1)], None, None))
        .await
        .unwrap();
    let err = repo.delete(user.id, completed.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let open = repo
        .create(user.id, &order_input(&[(taco.id, 1)], None, Some(OrderStatus::Open)))
        .await
        .unwrap();
    repo.delete(user.id, open.id).await.unwrap();
    let err = repo.get(user.id, open.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_filters_and_export_order() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;

    let repo = db.order_repo();
    let first = repo
        .create(user.id, &order_input(&[(taco.id, 1)], None, None))
        .await
        .unwrap();
    let second = repo
        .create(user.id, &order_input(&[(taco.id, 2)], None, Some(OrderStatus::Open)))
        .await
        .unwrap();

    let open = repo
        .list(
            user.id,
            &OrderFilter {
                status: Some(OrderStatus::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.id);

    let limited = repo
        .list(
            user.id,
            &OrderFilter {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    let now = Utc::now();
    let exported = repo
        .export(user.id, now - TimeDelta::hours(1), now + TimeDelta::hours(1))
        .await
        .unwrap();
    let ids: Vec<Uuid> = exported.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}
