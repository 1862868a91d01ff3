//! Router tests against the in-memory store and a scripted gateway

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_rental::{
    api,
    config::AppConfig,
    models::user::UserClaims,
    repository::Repository,
    services::{
        gateway::{CheckoutRequest, CheckoutSession, PaymentGateway, SessionStatus},
        notifications::{LogNotifier, NotificationService},
        Services,
    },
    AppResult, AppState,
};

/// Issues numbered sessions and reports every session as paid
#[derive(Default)]
struct PaidGateway {
    issued: AtomicUsize,
    polled: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for PaidGateway {
    async fn create_session(&self, _request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CheckoutSession {
            session_id: format!("cs_test_{}", n),
            session_url: format!("https://checkout.test/cs_test_{}", n),
        })
    }

    async fn get_session_status(&self, _session_id: &str) -> AppResult<SessionStatus> {
        self.polled.fetch_add(1, Ordering::SeqCst);
        Ok(SessionStatus { paid: true, expired: false })
    }
}

struct TestApp {
    router: Router,
    gateway: Arc<PaidGateway>,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let gateway = Arc::new(PaidGateway::default());
        let services = Services::new(
            Repository::in_memory(),
            gateway.clone(),
            NotificationService::new(Arc::new(LogNotifier)),
            &config.payments,
        );
        let secret = config.auth.jwt_secret.clone();

        let router = api::create_router(AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        });

        Self { router, gateway, secret }
    }

    fn token(&self, user_id: i32, is_staff: bool) -> String {
        UserClaims::new(user_id, is_staff, 1)
            .create_token(&self.secret)
            .unwrap()
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_book(&self, daily_fee: &str, inventory: i32) -> i64 {
        let staff = self.token(1, true);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/books",
                Some(&staff),
                Some(json!({
                    "title": "Neuromancer",
                    "author": "William Gibson",
                    "daily_fee": daily_fee,
                    "inventory": inventory,
                    "cover": "HARD"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn borrow(&self, token: &str, book_id: i64, days: i64) -> (StatusCode, Value) {
        let expected = Utc::now().date_naive() + Duration::days(days);
        self.send(
            Method::POST,
            "/api/v1/borrowings",
            Some(token),
            Some(json!({ "book_id": book_id, "expected_return_date": expected })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_catalog_writes_require_staff() {
    let app = TestApp::new();
    let reader = app.token(7, false);
    let book = json!({ "title": "Emma", "author": "Jane Austen", "daily_fee": "1.00", "inventory": 1 });

    let (status, _) = app.send(Method::POST, "/api/v1/books", None, Some(book.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::POST, "/api/v1/books", Some(&reader), Some(book)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, body) = app.send(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_invalid_book_rejected() {
    let app = TestApp::new();
    let staff = app.token(1, true);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/books",
            Some(&staff),
            Some(json!({ "title": "", "author": "Nobody", "daily_fee": "1.00", "inventory": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_oversized_fee_rejected() {
    let app = TestApp::new();
    let staff = app.token(1, true);

    for fee in ["79228162514264337593543950335", "100000000.00"] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/books",
                Some(&staff),
                Some(json!({ "title": "Ledger", "author": "Nobody", "daily_fee": fee, "inventory": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BadValue");
    }

    let (_, listed) = app.send(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_patch_and_delete_book() {
    let app = TestApp::new();
    let staff = app.token(1, true);
    let book_id = app.create_book("2.00", 1).await;
    let uri = format!("/api/v1/books/{}", book_id);

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&staff), Some(json!({ "inventory": 4 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inventory"], 4);
    assert_eq!(body["title"], "Neuromancer");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_borrow_charges_rental_and_takes_stock() {
    let app = TestApp::new();
    let reader = app.token(7, false);
    let book_id = app.create_book("2.00", 1).await;

    let (status, body) = app.borrow(&reader, book_id, 5).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], 7);
    assert!(body["actual_return_date"].is_null());
    assert_eq!(body["payment"]["money_to_pay"], "10.00");
    assert_eq!(body["payment"]["status"], "PENDING");
    assert_eq!(body["payment"]["type"], "PAYMENT");

    let (_, book) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book_id), None, None)
        .await;
    assert_eq!(book["inventory"], 0);

    let (status, body) = app.borrow(&app.token(8, false), book_id, 5).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InsufficientInventory");
}

#[tokio::test]
async fn test_borrow_rejects_past_return_date() {
    let app = TestApp::new();
    let reader = app.token(7, false);
    let book_id = app.create_book("2.00", 1).await;

    let (status, _) = app.borrow(&reader, book_id, -1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/borrowings",
            Some(&reader),
            Some(json!({ "book_id": book_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_borrowings_are_private() {
    let app = TestApp::new();
    let owner = app.token(7, false);
    let other = app.token(8, false);
    let staff = app.token(1, true);
    let book_id = app.create_book("1.00", 2).await;

    let (_, created) = app.borrow(&owner, book_id, 2).await;
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/api/v1/borrowings/{}", id);

    let (status, body) = app.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["title"], "Neuromancer");
    assert_eq!(body["is_active"], true);

    let (status, _) = app.send(Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::POST, &format!("{}/return", uri), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, still_active) = app.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(still_active["is_active"], true);

    let (_, listed) = app
        .send(Method::GET, "/api/v1/borrowings?user_id=7", Some(&other), None)
        .await;
    assert_eq!(listed, json!([]));

    let (_, listed) = app
        .send(Method::GET, "/api/v1/borrowings?user_id=7&is_active=true", Some(&staff), None)
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_return_once() {
    let app = TestApp::new();
    let reader = app.token(7, false);
    let book_id = app.create_book("1.00", 1).await;

    let (_, created) = app.borrow(&reader, book_id, 3).await;
    let uri = format!("/api/v1/borrowings/{}/return", created["id"]);

    let (status, body) = app.send(Method::POST, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["actual_return_date"].is_string());
    assert!(body["fine"].is_null());

    let (status, body) = app.send(Method::POST, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "AlreadyReturned");

    let (_, book) = app
        .send(Method::GET, &format!("/api/v1/books/{}", book_id), None, None)
        .await;
    assert_eq!(book["inventory"], 1);
}

#[tokio::test]
async fn test_payment_success_redirect() {
    let app = TestApp::new();
    let reader = app.token(7, false);
    let book_id = app.create_book("2.00", 1).await;
    let (_, created) = app.borrow(&reader, book_id, 2).await;
    let session_id = created["payment"]["session_id"].as_str().unwrap().to_string();

    let (status, _) = app.send(Method::GET, "/api/v1/payments/success", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/payments/success?session_id={}", session_id);
    let (status, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["status"], "PAID");

    let (status, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["status"], "PAID");
    assert_eq!(app.gateway.polled.load(Ordering::SeqCst), 1);

    let (status, _) = app
        .send(Method::GET, "/api/v1/payments/success?session_id=cs_unknown", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_cancel_redirect() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/payments/cancel", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["detail"].as_str().unwrap().contains("cancelled"));
}

#[tokio::test]
async fn test_payments_follow_borrowing_owner() {
    let app = TestApp::new();
    let owner = app.token(7, false);
    let other = app.token(8, false);
    let staff = app.token(1, true);
    let book_id = app.create_book("2.00", 1).await;
    let (_, created) = app.borrow(&owner, book_id, 2).await;
    let payment_uri = format!("/api/v1/payments/{}", created["payment"]["id"]);

    let (_, mine) = app.send(Method::GET, "/api/v1/payments", Some(&owner), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, theirs) = app.send(Method::GET, "/api/v1/payments", Some(&other), None).await;
    assert_eq!(theirs, json!([]));

    let (status, _) = app.send(Method::GET, &payment_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::POST, &format!("{}/expire", payment_uri), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, &format!("{}/expire", payment_uri), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");
}
