//! Shared fixtures and full-router tests.

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use serde_json::Value;
use siteforge_core::store::SiteStore as _;
use siteforge_provisioning::reconciler::LEASE_NAME;
use siteforge_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use crate::{AppState, Service, ServerConfig, router};

// ─── Fixtures ─────────────────────────────────────────────────────────────────

/// A configuration pointing at a provider nobody listens on.
pub(crate) fn test_config(password: &str) -> ServerConfig {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string();

  config::Config::builder()
    .set_override("host", "127.0.0.1").unwrap()
    .set_override("port", 0).unwrap()
    .set_override("store_path", ":memory:").unwrap()
    .set_override("auth_username", "admin").unwrap()
    .set_override("auth_password_hash", hash).unwrap()
    .set_override("provider.base_url", "http://127.0.0.1:1").unwrap()
    .set_override("provider.timeout_secs", 1).unwrap()
    .build()
    .unwrap()
    .try_deserialize()
    .unwrap()
}

async fn state() -> AppState {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(&test_config("secret"), store).unwrap()
}

pub(crate) async fn service() -> Service {
  let state = state().await;
  std::sync::Arc::into_inner(state.service).unwrap()
}

/// A service whose reconciler lease is held by another process.
pub(crate) async fn held_lease_service() -> Service {
  let service = service().await;
  let acquired = service
    .store()
    .try_acquire_lease(LEASE_NAME, "other-instance", chrono::Duration::minutes(5))
    .await
    .unwrap();
  assert!(acquired);
  service
}

fn basic(user: &str, pass: &str) -> String {
  format!("Basic {}", B64.encode(format!("{user}:{pass}")))
}

async fn get(uri: &str, authorization: Option<&str>) -> axum::response::Response {
  let app = router(&state().await);
  let mut req = Request::builder().uri(uri);
  if let Some(value) = authorization {
    req = req.header(header::AUTHORIZATION, value);
  }
  app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
}

// ─── Router ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_credentials() {
  let resp = get("/health", None).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn api_rejects_missing_credentials() {
  let resp = get("/api/sites", None).await;

  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn api_rejects_wrong_password() {
  let resp = get("/api/sites", Some(&basic("admin", "nope"))).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn api_serves_authenticated_requests() {
  let resp = get("/api/sites", Some(&basic("admin", "secret"))).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(body, Value::Array(vec![]));
}

#[tokio::test]
async fn missing_site_is_404_after_auth() {
  let resp = get("/api/sites/nope", Some(&basic("admin", "secret"))).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_api_key_is_server_error() {
  let resp = get("/api/templates", Some(&basic("admin", "secret"))).await;
  // No API key is configured, so the client refuses before dialling out.
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
