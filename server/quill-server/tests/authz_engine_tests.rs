//! HTTP behaviour when the authorization engine misbehaves: failed and
//! stalled checks never expose posts, and listing bounds its check fan-out.

use async_trait::async_trait;
use auth_identity::InMemoryUserRepository;
use auth_permify::{
    AuthzError, Authorizer, CheckRequest, CheckResult, InMemoryEngine, OperationContext, PermissionEngine,
    RelationshipWriteRequest, Result, SchemaVersion, SnapToken, TenantId,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use quill_server::config::DatabaseBackend;
use quill_server::db::{InMemoryDomainRepository, InMemoryPostRepository};
use quill_server::{create_app, AppConfig, QuillServer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const HEALTHY: u8 = 0;
const UNREACHABLE: u8 = 1;
const STALLED: u8 = 2;

/// Writes go to an in-memory engine; checks follow `mode` and are counted
struct FlakyEngine {
    inner: InMemoryEngine,
    mode: AtomicU8,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyEngine {
    fn new() -> Self {
        Self {
            inner: InMemoryEngine::new(),
            mode: AtomicU8::new(HEALTHY),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn set_mode(&self, mode: u8) {
        self.mode.store(mode, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionEngine for FlakyEngine {
    async fn write_schema(&self, tenant: &TenantId, schema: &str) -> Result<SchemaVersion> {
        self.inner.write_schema(tenant, schema).await
    }

    async fn write_relationships(&self, tenant: &TenantId, request: RelationshipWriteRequest) -> Result<SnapToken> {
        self.inner.write_relationships(tenant, request).await
    }

    async fn check(&self, tenant: &TenantId, request: CheckRequest) -> Result<CheckResult> {
        match self.mode.load(Ordering::SeqCst) {
            UNREACHABLE => Err(AuthzError::transport(
                OperationContext::new("permission.check", tenant.as_str()),
                "connection refused",
            )),
            STALLED => std::future::pending().await,
            _ => {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                let result = self.inner.check(tenant, request).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                result
            }
        }
    }
}

async fn test_app(engine: Arc<FlakyEngine>, list_check_concurrency: usize) -> Router {
    let mut config = AppConfig::default();
    config.database.backend = DatabaseBackend::Memory;
    config.session.secret = "quill-test-secret-quill-test-secret".to_string();
    config.session.secure_cookies = false;
    config.authz.check_timeout_ms = 100;
    config.posts.list_check_concurrency = list_check_concurrency;

    let authorizer = Authorizer::provision(engine, &config.authz).await.unwrap();
    let server = QuillServer::from_parts(
        config,
        authorizer,
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryPostRepository::new()),
        Arc::new(InMemoryDomainRepository::new()),
        None,
    );
    create_app(server)
}

async fn send(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn session(app: &Router) -> String {
    let (status, _) = post_json(
        app,
        "/auth/register",
        json!({ "email": "ada@example.com", "name": "Ada", "password": "correct-horse-battery" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, session) = post_json(
        app,
        "/auth/login",
        json!({ "email": "ada@example.com", "password": "correct-horse-battery" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    session["access_token"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, token: &str, title: &str) -> String {
    let (status, post) = send(app, Method::POST, "/posts", token, Some(json!({ "title": title }))).await;
    assert_eq!(status, StatusCode::CREATED);
    post["id"].as_str().unwrap().to_string()
}

fn assert_no_post_data(body: &Value) {
    assert!(!body.is_array());
    assert!(body.get("title").is_none());
    assert!(body.get("body").is_none());
}

#[tokio::test]
async fn test_unreachable_engine_hides_posts() {
    let engine = Arc::new(FlakyEngine::new());
    let app = test_app(engine.clone(), 16).await;
    let token = session(&app).await;
    let id = create_post(&app, &token, "Secret plans").await;

    engine.set_mode(UNREACHABLE);

    let (status, body) = send(&app, Method::GET, "/posts", &token, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_no_post_data(&body);

    let (status, body) = send(&app, Method::GET, &format!("/posts/{}", id), &token, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_no_post_data(&body);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/posts/{}", id),
        &token,
        Some(json!({ "title": "Leaked" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    engine.set_mode(HEALTHY);
    let (status, post) = send(&app, Method::GET, &format!("/posts/{}", id), &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["title"], "Secret plans");
}

#[tokio::test]
async fn test_stalled_engine_times_out() {
    let engine = Arc::new(FlakyEngine::new());
    let app = test_app(engine.clone(), 16).await;
    let token = session(&app).await;
    let id = create_post(&app, &token, "Slow news").await;

    engine.set_mode(STALLED);

    let (status, body) = send(&app, Method::GET, &format!("/posts/{}", id), &token, None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_no_post_data(&body);

    let (status, body) = send(&app, Method::GET, "/posts", &token, None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_no_post_data(&body);
}

#[tokio::test]
async fn test_listing_bounds_concurrent_checks() {
    let engine = Arc::new(FlakyEngine::new());
    let app = test_app(engine.clone(), 3).await;
    let token = session(&app).await;
    for n in 0..12 {
        create_post(&app, &token, &format!("Post {}", n)).await;
    }

    let (status, posts) = send(&app, Method::GET, "/posts", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts.as_array().unwrap().len(), 12);

    let peak = engine.max_in_flight.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 3, "peak concurrent checks was {}", peak);
}
