use std::{error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::{ConnectionTrait, Database, Statement};
use serde_json::{Value, json};
use tokio::sync::watch;
use tower::ServiceExt;

use engine::{Engine, Recognizer};
use migration::MigratorTrait;
use server::{ServerState, router, run_with_listener};

struct CannedRecognizer(Result<&'static str, &'static str>);

#[async_trait]
impl Recognizer for CannedRecognizer {
    async fn recognize(
        &self,
        _system_prompt: &str,
        _text: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        match self.0 {
            Ok(content) => Ok(content.to_string()),
            Err(reason) => Err(reason.into()),
        }
    }
}

async fn state_with(recognizer: Option<CannedRecognizer>) -> ServerState {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    let now = Utc::now();
    for (offset, id) in ["alice", "bob", "relay"].into_iter().enumerate() {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (id, name, email, password, created_at) VALUES (?, ?, ?, ?, ?)",
            vec![
                id.into(),
                id.into(),
                format!("{id}@example.com").into(),
                "password".into(),
                (now + chrono::Duration::seconds(offset as i64)).into(),
            ],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder().database(db).build().await.unwrap();
    ServerState {
        engine: Arc::new(engine),
        recognizer: recognizer.map(|r| Arc::new(r) as Arc<dyn Recognizer>),
        chat_relay: Some("Relay@example.com".to_string()),
    }
}

fn basic(user: &str) -> String {
    let token = STANDARD.encode(format!("{user}@example.com:password"));
    format!("Basic {token}")
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, basic(user));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_needs_no_credentials_but_the_rest_does() {
    let app = router(state_with(None).await);

    let (status, body) = send(&app, request("GET", "/api/v1/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, request("GET", "/api/v1/users/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/api/v1/users/me")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("alice@example.com:nope")),
        )
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, request("GET", "/api/v1/users/me", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "alice");
}

#[tokio::test]
async fn shared_expense_round_trip() {
    let app = router(state_with(None).await);

    let (status, created) = send(
        &app,
        request(
            "POST",
            "/api/v1/transactions",
            Some("alice"),
            Some(json!({
                "transaction_type": "expense",
                "amount_minor": 10_000,
                "description": "dinner",
                "split": {"mode": "percentages", "values": ["60", "40"]}
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_shared"], true);
    assert_eq!(created["category"], "dinner");
    assert_eq!(created["shares"][0]["user_id"], "alice");
    assert_eq!(created["shares"][0]["amount_minor"], 6_000);
    assert_eq!(created["shares"][1]["user_id"], "bob");
    assert_eq!(created["shares"][1]["percentage"], "40.00");
    assert_eq!(created["shares"][1]["user_name"], "bob");
    let id = created["id"].as_str().unwrap().to_string();

    // The counterpart can read the transaction but not change it.
    let uri = format!("/api/v1/transactions/{id}");
    let (status, _) = send(&app, request("GET", &uri, Some("bob"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, request("DELETE", &uri, Some("bob"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = send(
        &app,
        request("GET", "/api/v1/transactions/summary", Some("bob"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["counterpart_expense_minor"], 10_000);
    assert_eq!(summary["counterpart_splited"]["me_minor"], 6_000);
    assert_eq!(summary["counterpart_splited"]["shared_minor"], 4_000);

    let (status, _) = send(&app, request("DELETE", &uri, Some("alice"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", &uri, Some("alice"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_errors_map_to_422() {
    let app = router(state_with(None).await);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/transactions",
            Some("alice"),
            Some(json!({
                "transaction_type": "expense",
                "amount_minor": 10_000,
                "split": {"mode": "amounts", "values_minor": [5_000, 4_000]}
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("split"));

    let (status, _) = send(
        &app,
        request("GET", "/api/v1/transactions?sort=-password", Some("alice"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        request(
            "GET",
            "/api/v1/transactions/summary?start_date=2025-06-02&end_date=2025-06-01",
            Some("alice"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

fn as_chat(user: &str, chat_id: &str) -> Request<Body> {
    let mut req = request("GET", "/api/v1/users/me", Some(user), None);
    req.headers_mut()
        .insert("telegram-user-id", chat_id.parse().unwrap());
    req
}

#[tokio::test]
async fn chat_header_acts_as_linked_user() {
    let app = router(state_with(None).await);

    // Unlinked chat ids are rejected.
    let (status, _) = send(&app, as_chat("relay", "4242")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, linked) = send(
        &app,
        request(
            "POST",
            "/api/v1/users/telegram",
            Some("relay"),
            Some(json!({"email": "Alice@Example.com", "telegram_id": 4242})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(linked["telegram_id"], 4242);

    let (status, me) = send(&app, as_chat("relay", "4242")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "alice");
}

#[tokio::test]
async fn only_the_relay_account_speaks_for_chats() {
    let app = router(state_with(None).await);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/users/telegram",
            Some("bob"),
            Some(json!({"email": "alice@example.com", "telegram_id": 4242})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/users/telegram",
            Some("relay"),
            Some(json!({"email": "alice@example.com", "telegram_id": 4242})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A linked chat id does not let another account act as alice.
    let (status, _) = send(&app, as_chat("bob", "4242")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn recognize_stores_or_reports_bad_gateway() {
    let content = r#"{"description": "makan ayam", "amount": 50000, "category": "food"}"#;
    let app = router(state_with(Some(CannedRecognizer(Ok(content)))).await);
    let (status, tx) = send(
        &app,
        request(
            "POST",
            "/api/v1/transactions/recognize",
            Some("alice"),
            Some(json!({"text": "makan ayam 50000"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tx["transaction_type"], "expense");
    assert_eq!(tx["amount_minor"], 5_000_000);
    assert_eq!(tx["category"], "food");

    let app = router(state_with(Some(CannedRecognizer(Err("timeout")))).await);
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/v1/transactions/recognize",
            Some("alice"),
            Some(json!({"text": "makan ayam 50000"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "could not understand the message");

    let app = router(state_with(None).await);
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/transactions/recognize",
            Some("alice"),
            Some(json!({"text": "makan ayam 50000"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn wallets_and_scopes_endpoints() {
    let app = router(state_with(None).await);

    let (status, wallet) = send(
        &app,
        request(
            "POST",
            "/api/v1/wallets",
            Some("alice"),
            Some(json!({"name": "Cash", "balance_minor": 100_000})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/v1/wallets",
            Some("alice"),
            Some(json!({"name": "cash"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/api/v1/wallets/{}", wallet["id"].as_str().unwrap());
    let (status, renamed) = send(
        &app,
        request("PUT", &uri, Some("alice"), Some(json!({"name": "Wallet"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Wallet");

    let (status, scope) = send(
        &app,
        request(
            "POST",
            "/api/v1/scopes",
            Some("alice"),
            Some(json!({"name": "Food", "amount_minor": 20_000, "categories": ["makan"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(scope["categories"], json!(["makan"]));

    send(
        &app,
        request(
            "POST",
            "/api/v1/transactions",
            Some("alice"),
            Some(json!({
                "transaction_type": "expense",
                "amount_minor": 5_000,
                "category": "Makan"
            })),
        ),
    )
    .await;

    let (status, overviews) = send(
        &app,
        request("GET", "/api/v1/scopes/overviews", Some("alice"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overviews[0]["total_amount_transaction_minor"], 5_000);
    assert_eq!(overviews[0]["leftout_minor"], 15_000);
    assert_eq!(overviews[0]["progress"], "25.00");

    let (status, page) = send(
        &app,
        request("GET", "/api/v1/scopes?keyword=foo", Some("alice"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn server_stops_when_shutdown_flips() {
    let state = state_with(None).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(run_with_listener(
        state,
        listener,
        rx,
        Duration::from_secs(5),
    ));

    tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
