use std::io::Write;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use crate::integration::common::{
    TEST_WEBHOOK_TOKEN, get_request, json_body, json_request, session_cookie, setup_test_app,
};

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = app.send(get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let (status, json) = app.send(get_request("/api/products", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");

    let (status, _) = app
        .send(get_request("/api/products", Some("comanda_session=forged")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_me_logout() {
    let app = setup_test_app().await;
    let cookie = app.register("Owner@Cantina.test").await;

    let (status, me) = app.send(get_request("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "owner@cantina.test");
    assert_eq!(me["business_name"], "Cantina Test");

    // Same email again
    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({"email": "owner@cantina.test", "password": "another-pass", "business_name": "X"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"email": "owner@cantina.test", "password": "wrong-password"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"email": "owner@cantina.test", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second = session_cookie(&response).expect("login sets a session cookie");
    assert_ne!(second, cookie);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/auth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = app.send(get_request("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The other session is untouched
    let (status, _) = app.send(get_request("/api/auth/me", Some(&second))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_body_returns_json_error() {
    let app = setup_test_app().await;
    let cookie = app.register("owner@cantina.test").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/products")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].is_string());
    assert!(json["message"].is_string());

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&cookie),
            json!({"name": "Taco", "price_cents": -5}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, json) = app
        .send(get_request(
            "/api/products/00000000-0000-0000-0000-000000000000",
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn tenants_cannot_see_each_other() {
    let app = setup_test_app().await;
    let owner = app.register("owner@cantina.test").await;
    let rival = app.register("rival@cantina.test").await;

    let (status, product) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&owner),
            json!({"name": "Taco", "price_cents": 450}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/products/{}", product["id"].as_str().unwrap());

    let (status, _) = app.send(get_request(&uri, Some(&rival))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = app.send(get_request("/api/products", Some(&rival))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn order_flow_accrues_points() {
    let app = setup_test_app().await;
    let cookie = app.register("owner@cantina.test").await;

    let (_, taco) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&cookie),
            json!({"name": "Taco", "price_cents": 450}),
        ))
        .await;
    let taco_id = taco["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/rewards/config",
            Some(&cookie),
            json!({"kind": "earn_product", "product_id": taco_id, "points": 2}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, customer) = app
        .send(json_request(
            "POST",
            "/api/customers",
            Some(&cookie),
            json!({"name": "Ana", "phone": "+55 11 98888-7777"}),
        ))
        .await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let (status, preview) = app
        .send(json_request(
            "POST",
            "/api/rewards/preview",
            Some(&cookie),
            json!({"items": [{"product_id": taco_id, "quantity": 3}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["total_cents"], 1350);
    assert_eq!(preview["points"], 6);

    let (status, order) = app
        .send(json_request(
            "POST",
            "/api/orders",
            Some(&cookie),
            json!({
                "items": [{"product_id": taco_id, "quantity": 3}],
                "customer_id": customer_id,
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "completed");
    assert_eq!(order["total_cents"], 1350);
    assert_eq!(order["points_earned"], 6);

    let (_, customer) = app
        .send(get_request(&format!("/api/customers/{customer_id}"), Some(&cookie)))
        .await;
    assert_eq!(customer["points"], 6);

    let (status, list) = app.send(get_request("/api/orders", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    // Cancelling takes the points back
    let (status, cancelled) = app
        .send(json_request(
            "PATCH",
            &format!("/api/orders/{}/status", order["id"].as_str().unwrap()),
            Some(&cookie),
            json!({"status": "cancelled"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, customer) = app
        .send(get_request(&format!("/api/customers/{customer_id}"), Some(&cookie)))
        .await;
    assert_eq!(customer["points"], 0);
}

#[tokio::test]
async fn redeem_without_enough_points_returns_422() {
    let app = setup_test_app().await;
    let cookie = app.register("owner@cantina.test").await;

    let (_, taco) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&cookie),
            json!({"name": "Taco", "price_cents": 450}),
        ))
        .await;
    let taco_id = taco["id"].as_str().unwrap().to_string();

    app.send(json_request(
        "POST",
        "/api/rewards/config",
        Some(&cookie),
        json!({"kind": "redeem_product", "product_id": taco_id, "points": 10}),
    ))
    .await;

    let (_, customer) = app
        .send(json_request(
            "POST",
            "/api/customers",
            Some(&cookie),
            json!({"name": "Ana"}),
        ))
        .await;

    let (status, order) = app
        .send(json_request(
            "POST",
            "/api/orders",
            Some(&cookie),
            json!({
                "items": [{"product_id": taco_id, "quantity": 1}],
                "customer_id": customer["id"],
                "status": "open",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/rewards/redeem",
            Some(&cookie),
            json!({"order_id": order["id"], "product_id": taco_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "insufficient_points");
}

/// Collects formatted log lines written while it is the default subscriber.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
async fn redeem_spends_points_and_logs_once() {
    let app = setup_test_app().await;
    let cookie = app.register("owner@cantina.test").await;

    let (_, churro) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&cookie),
            json!({"name": "Churro", "price_cents": 300}),
        ))
        .await;
    let churro_id = churro["id"].as_str().unwrap().to_string();
    app.send(json_request(
        "POST",
        "/api/rewards/config",
        Some(&cookie),
        json!({"kind": "redeem_product", "product_id": churro_id, "points": 10}),
    ))
    .await;

    let (_, customer) = app
        .send(json_request(
            "POST",
            "/api/customers",
            Some(&cookie),
            json!({"name": "Ana"}),
        ))
        .await;
    let points_uri = format!("/api/customers/{}/points", customer["id"].as_str().unwrap());

    let (status, json) = app
        .send(json_request(
            "POST",
            &points_uri,
            Some(&cookie),
            json!({"delta": i64::MIN}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, json) = app
        .send(json_request(
            "POST",
            &points_uri,
            Some(&cookie),
            json!({"delta": 25, "reason": "welcome gift"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["points"], 25);

    let (_, order) = app
        .send(json_request(
            "POST",
            "/api/orders",
            Some(&cookie),
            json!({
                "items": [{"product_id": churro_id, "quantity": 1}],
                "customer_id": customer["id"],
                "status": "open",
            }),
        ))
        .await;

    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (status, json) = app
        .send(json_request(
            "POST",
            "/api/rewards/redeem",
            Some(&cookie),
            json!({"order_id": order["id"], "product_id": churro_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["points_spent"], 10);
    assert_eq!(json["remaining_points"], 15);

    assert_eq!(capture.contents().matches("Product redeemed").count(), 1);
}

#[tokio::test]
async fn webhook_requires_token() {
    let app = setup_test_app().await;

    let event = json!({
        "event": "message",
        "session": "user-unknown",
        "payload": {"from": "5511988887777@c.us", "body": "hi"},
    });

    let (status, _) = app
        .send(json_request("POST", "/webhooks/whatsapp", None, event.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = json_request("POST", "/webhooks/whatsapp", None, event.clone());
    request
        .headers_mut()
        .insert("x-webhook-token", "wrong".parse().unwrap());
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = json_request("POST", "/webhooks/whatsapp", None, event);
    request
        .headers_mut()
        .insert("x-webhook-token", TEST_WEBHOOK_TOKEN.parse().unwrap());
    let (status, json) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ignored");
}

#[tokio::test]
async fn webhook_message_opens_conversation() {
    let app = setup_test_app().await;
    let cookie = app.register("owner@cantina.test").await;

    let (status, config) = app
        .send(get_request("/api/chatbot/config", Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["bot"]["status"], "disconnected");
    assert_eq!(config["ai_available"], false);
    let session = config["bot"]["session_name"].as_str().unwrap().to_string();

    // No rules and no AI: the message is stored without a reply
    let mut request = json_request(
        "POST",
        "/webhooks/whatsapp",
        None,
        json!({
            "event": "message",
            "session": session,
            "payload": {
                "from": "5511988887777@c.us",
                "fromMe": false,
                "body": "Hello",
                "_data": {"notifyName": "Ana"},
            },
        }),
    );
    request
        .headers_mut()
        .insert("x-webhook-token", TEST_WEBHOOK_TOKEN.parse().unwrap());
    let (status, json) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processed");

    let (status, conversations) = app
        .send(get_request("/api/chatbot/conversations", Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let conversations = conversations.as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["contact_phone"], "5511988887777");
    assert_eq!(conversations[0]["contact_name"], "Ana");

    let uri = format!(
        "/api/chatbot/conversations/{}/messages",
        conversations[0]["id"].as_str().unwrap()
    );
    let (status, messages) = app.send(get_request(&uri, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["body"], "Hello");
    assert_eq!(messages[0]["source"], "contact");

    // Group chats are ignored
    let mut request = json_request(
        "POST",
        "/webhooks/whatsapp",
        None,
        json!({
            "event": "message",
            "session": session,
            "payload": {"from": "120363000000000000@g.us", "body": "hi all"},
        }),
    );
    request
        .headers_mut()
        .insert("x-webhook-token", TEST_WEBHOOK_TOKEN.parse().unwrap());
    let (_, json) = app.send(request).await;
    assert_eq!(json["status"], "ignored");
}

#[tokio::test]
async fn chatbot_rules_crud() {
    let app = setup_test_app().await;
    let cookie = app.register("owner@cantina.test").await;

    let (status, rule) = app
        .send(json_request(
            "POST",
            "/api/chatbot/rules",
            Some(&cookie),
            json!({
                "name": "Menu",
                "trigger": "keyword",
                "match_kind": "contains",
                "pattern": "menu",
                "response": "Here is our menu",
                "priority": 5,
                "active": true,
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, rules) = app.send(get_request("/api/chatbot/rules", Some(&cookie))).await;
    assert_eq!(rules.as_array().unwrap().len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::delete(format!("/api/chatbot/rules/{}", rule["id"].as_str().unwrap()))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
