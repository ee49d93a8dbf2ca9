use comanda_core::auth::{NewUser, User};
use comanda_core::catalog::{Product, ProductInput};
use comanda_core::customer::{Customer, CustomerInput};
use comanda_core::points::{PointsRuleInput, PointsRuleKind};
use comanda_db::Database;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use uuid::Uuid;

/// Spins up a PostgreSQL container, runs the migrations, and returns the
/// database facade.
///
/// Keep the `ContainerAsync` in scope for the test duration; dropping it
/// stops the container.
pub async fn setup_test_db() -> (Database, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "comanda_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/comanda_test");

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    let db = Database::from_pool(pool);
    db.migrate().await.expect("Failed to run migrations");
    (db, container)
}

pub async fn seed_user(db: &Database, email: &str) -> User {
    db.user_repo()
        .create(&NewUser {
            email: email.into(),
            password_hash: "not-a-real-hash".into(),
            business_name: "Cantina".into(),
        })
        .await
        .expect("Failed to create user")
}

pub async fn seed_product(db: &Database, user_id: Uuid, name: &str, price_cents: i64) -> Product {
    db.catalog_repo()
        .create_product(
            user_id,
            &ProductInput {
                category_id: None,
                name: name.into(),
                description: None,
                price_cents,
                cost_cents: 0,
                active: true,
            },
        )
        .await
        .expect("Failed to create product")
}

pub async fn seed_customer(db: &Database, user_id: Uuid, name: &str, phone: &str) -> Customer {
    db.customer_repo()
        .create(
            user_id,
            &CustomerInput {
                name: name.into(),
                phone: Some(phone.into()),
                email: None,
                notes: None,
            },
        )
        .await
        .expect("Failed to create customer")
}

pub async fn seed_rule(
    db: &Database,
    user_id: Uuid,
    kind: PointsRuleKind,
    product_id: Option<Uuid>,
    min_amount_cents: Option<i64>,
    points: i64,
) {
    db.points_repo()
        .create(
            user_id,
            &PointsRuleInput {
                kind,
                product_id,
                category_id: None,
                min_amount_cents,
                points,
                active: true,
            },
        )
        .await
        .expect("Failed to create points rule");
}
