use chrono::{NaiveDate, Utc};
use comanda_core::catalog::{CategoryInput, ProductFilter, ProductInput};
use comanda_core::customer::CustomerInput;
use comanda_core::error::AppError;
use comanda_core::expense::{ExpenseFilter, ExpenseInput, SupplierInput};
use comanda_core::order::{OrderInput, OrderItemInput};
use comanda_core::payment::PaymentMethodInput;

use crate::integration::common::{seed_customer, seed_product, seed_user, setup_test_db};

#[tokio::test]
async fn products_are_scoped_to_category_and_tenant() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let other = seed_user(&db, "other@cantina.test").await;
    let catalog = db.catalog_repo();

    let drinks = catalog
        .create_category(
            user.id,
            &CategoryInput {
                name: "Drinks".into(),
                description: None,
            },
        )
        .await
        .unwrap();

    let lemonade = catalog
        .create_product(
            user.id,
            &ProductInput {
                category_id: Some(drinks.id),
                name: "Lemonade".into(),
                description: Some("Fresh".into()),
                price_cents: 350,
                cost_cents: 80,
                active: true,
            },
        )
        .await
        .unwrap();
    seed_product(&db, user.id, "Taco", 450).await;
    seed_product(&db, other.id, "Pizza", 2500).await;

    let in_drinks = catalog
        .list_products(
            user.id,
            &ProductFilter {
                category_id: Some(drinks.id),
                active: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(in_drinks.len(), 1);
    assert_eq!(in_drinks[0].id, lemonade.id);

    let all = catalog
        .list_products(user.id, &ProductFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    // Another tenant's category is not a valid reference
    let err = catalog
        .create_product(
            other.id,
            &ProductInput {
                category_id: Some(drinks.id),
                name: "Soda".into(),
                description: None,
                price_cents: 300,
                cost_cents: 0,
                active: true,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = catalog.get_product(other.id, lemonade.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn menu_lists_only_active_products() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let catalog = db.catalog_repo();

    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let retired = seed_product(&db, user.id, "Old special", 900).await;
    catalog
        .update_product(
            user.id,
            retired.id,
            &ProductInput {
                category_id: None,
                name: retired.name.clone(),
                description: None,
                price_cents: retired.price_cents,
                cost_cents: 0,
                active: false,
            },
        )
        .await
        .unwrap();

    let menu = catalog.menu(user.id).await.unwrap();
    assert_eq!(menu.len(), 1);
    assert_eq!(menu[0].id, taco.id);
}

#[tokio::test]
async fn deleted_product_keeps_order_history() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;

    let order = db
        .order_repo()
        .create(
            user.id,
            &OrderInput {
                items: vec![OrderItemInput {
                    product_id: taco.id,
                    quantity: 2,
                }],
                customer_id: None,
                payment_method_id: None,
                promotion_id: None,
                status: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    db.catalog_repo().delete_product(user.id, taco.id).await.unwrap();

    let order = db.order_repo().get(user.id, order.id).await.unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].product_id, None);
    assert_eq!(order.items[0].product_name, "Taco");
    assert_eq!(order.total_cents, 900);
}

#[tokio::test]
async fn customer_phone_is_unique_per_tenant() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let other = seed_user(&db, "other@cantina.test").await;
    let customers = db.customer_repo();

    let ana = seed_customer(&db, user.id, "Ana", "+55 11 98888-7777").await;
    assert_eq!(ana.phone.as_deref(), Some("5511988887777"));

    let err = customers
        .create(
            user.id,
            &CustomerInput {
                name: "Ana again".into(),
                phone: Some("5511988887777".into()),
                email: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Same phone at another restaurant is fine
    seed_customer(&db, other.id, "Ana", "5511988887777").await;

    let found = customers
        .find_by_phone(user.id, "5511988887777")
        .await
        .unwrap()
        .expect("customer by phone");
    assert_eq!(found.id, ana.id);

    let matches = customers.list(user.id, Some("an")).await.unwrap();
    assert_eq!(matches.len(), 1);
    let none = customers.list(user.id, Some("100%")).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn manual_adjustment_cannot_go_negative() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let ana = seed_customer(&db, user.id, "Ana", "5511988887777").await;
    let customers = db.customer_repo();

    let credited = customers
        .adjust_points(user.id, ana.id, 12, Some("birthday"))
        .await
        .unwrap();
    assert_eq!(credited.points, 12);

    let err = customers
        .adjust_points(user.id, ana.id, -20, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientPoints {
            required: 20,
            available: 12
        }
    ));
    assert_eq!(customers.get(user.id, ana.id).await.unwrap().points, 12);
}

#[tokio::test]
async fn payment_method_names_are_unique() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let payments = db.payment_repo();

    let cash = PaymentMethodInput {
        name: "Cash".into(),
        active: true,
    };
    payments.create(user.id, &cash).await.unwrap();
    let err = payments.create(user.id, &cash).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    assert_eq!(payments.list(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn expenses_filter_and_summarize() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let expenses = db.expense_repo();

    let market = expenses
        .create_supplier(
            user.id,
            &SupplierInput {
                name: "Central Market".into(),
                contact_name: Some("Rui".into()),
                phone: None,
                email: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let day = |d: u32| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
    for (supplier_id, category, amount, date) in [
        (Some(market.id), "ingredients", 12_000, day(2)),
        (Some(market.id), "ingredients", 8_000, day(9)),
        (None, "rent", 150_000, day(1)),
        (None, "utilities", 9_500, day(20)),
    ] {
        expenses
            .create_expense(
                user.id,
                &ExpenseInput {
                    supplier_id,
                    category: category.into(),
                    description: None,
                    amount_cents: amount,
                    incurred_on: date,
                },
            )
            .await
            .unwrap();
    }

    let from_market = expenses
        .list_expenses(
            user.id,
            &ExpenseFilter {
                supplier_id: Some(market.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(from_market.len(), 2);
    assert_eq!(from_market[0].incurred_on, day(9));

    let summary = expenses
        .summary(user.id, Some(day(1)), Some(day(10)))
        .await
        .unwrap();
    assert_eq!(summary.total_cents, 170_000);
    assert_eq!(summary.by_category.len(), 2);
    assert_eq!(summary.by_category[0].category, "rent");
    assert_eq!(summary.by_category[1].total_cents, 20_000);
    assert_eq!(summary.by_category[1].count, 2);

    // Deleting the supplier keeps its expenses
    expenses.delete_supplier(user.id, market.id).await.unwrap();
    let all = expenses
        .list_expenses(user.id, &ExpenseFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|e| e.supplier_id.is_none()));
}

#[tokio::test]
async fn sales_summary_counts_completed_orders() {
    let (db, _container) = setup_test_db().await;
    let user = seed_user(&db, "owner@cantina.test").await;
    let taco = seed_product(&db, user.id, "Taco", 450).await;
    let soda = seed_product(&db, user.id, "Soda", 300).await;

    for (product_id, quantity) in [(taco.id, 3), (soda.id, 1), (taco.id, 1)] {
        db.order_repo()
            .create(
                user.id,
                &OrderInput {
                    items: vec![OrderItemInput {
                        product_id,
                        quantity,
                    }],
                    customer_id: None,
                    payment_method_id: None,
                    promotion_id: None,
                    status: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    let today = Utc::now().date_naive();
    let summary = db
        .report_repo()
        .sales_summary(user.id, today, today)
        .await
        .unwrap();

    assert_eq!(summary.order_count, 3);
    assert_eq!(summary.revenue_cents, 450 * 4 + 300);
    assert_eq!(summary.top_products[0].product_id, taco.id);
    assert_eq!(summary.top_products[0].quantity, 4);
}
