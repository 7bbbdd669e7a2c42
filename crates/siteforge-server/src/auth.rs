//! HTTP Basic-auth verification and the middleware guarding `/api`.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  Json,
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
  #[error("unauthorized")]
  Unauthorized,
}

impl IntoResponse for AuthError {
  fn into_response(self) -> Response {
    let mut res = (
      StatusCode::UNAUTHORIZED,
      Json(json!({ "error": self.to_string() })),
    )
      .into_response();
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Basic realm=\"siteforge\""),
    );
    res
  }
}

/// Check the `Authorization` header against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), AuthError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(AuthError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(AuthError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| AuthError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| AuthError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(AuthError::Unauthorized)?;
  if username != config.username {
    return Err(AuthError::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| AuthError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| AuthError::Unauthorized)
}

/// `axum::middleware::from_fn_with_state` layer: rejects the request with
/// 401 unless it carries valid credentials.
pub async fn require_auth(
  State(auth): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Response {
  match verify_auth(req.headers(), &auth) {
    Ok(()) => next.run(req).await,
    Err(e) => {
      debug!(uri = %req.uri(), "rejected unauthenticated request");
      e.into_response()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use rand_core::OsRng;

  fn config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value.parse().unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn correct_credentials() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&headers(&basic("admin", "secret")), &cfg), Ok(()));
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    assert_eq!(
      verify_auth(&headers(&basic("admin", "wrong")), &cfg),
      Err(AuthError::Unauthorized)
    );
  }

  #[test]
  fn wrong_username() {
    let cfg = config("secret");
    assert_eq!(
      verify_auth(&headers(&basic("root", "secret")), &cfg),
      Err(AuthError::Unauthorized)
    );
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&HeaderMap::new(), &cfg), Err(AuthError::Unauthorized));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    assert_eq!(
      verify_auth(&headers("Basic !!!not-base64!!!"), &cfg),
      Err(AuthError::Unauthorized)
    );
  }

  #[test]
  fn unparseable_hash_rejects() {
    let cfg = AuthConfig { username: "admin".into(), password_hash: "plain".into() };
    assert_eq!(
      verify_auth(&headers(&basic("admin", "plain")), &cfg),
      Err(AuthError::Unauthorized)
    );
  }

  #[test]
  fn rejection_carries_challenge() {
    let res = AuthError::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      res.headers().get(header::WWW_AUTHENTICATE).unwrap(),
      "Basic realm=\"siteforge\""
    );
  }
}
