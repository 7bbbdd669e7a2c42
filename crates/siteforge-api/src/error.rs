//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use siteforge_core::provider::ProviderError;
use siteforge_provisioning::{ProvisionError, ReconcileError};
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A provider call failed. `site_id` names the record left behind, if any.
  #[error("provider error: {source}")]
  Provider {
    site_id: Option<String>,
    #[source]
    source:  ProviderError,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ProvisionError> for ApiError {
  fn from(err: ProvisionError) -> Self {
    match err {
      ProvisionError::InvalidArgument(m) => Self::BadRequest(m),
      ProvisionError::NotFound(id) => Self::NotFound(format!("site {id} not found")),
      ProvisionError::Conflict(m) => Self::Conflict(m),
      ProvisionError::Provider { site_id, source } => {
        Self::Provider { site_id: Some(site_id), source }
      }
      ProvisionError::Store(e) => Self::Store(e),
    }
  }
}

impl From<ReconcileError> for ApiError {
  fn from(err: ReconcileError) -> Self {
    match err {
      ReconcileError::Store(e) => Self::Store(e),
    }
  }
}

impl From<ProviderError> for ApiError {
  fn from(source: ProviderError) -> Self { Self::Provider { site_id: None, source } }
}

fn provider_status(err: &ProviderError) -> StatusCode {
  match err {
    ProviderError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
    // A missing API key is a server misconfiguration, not the caller's fault.
    ProviderError::Unauthenticated => StatusCode::INTERNAL_SERVER_ERROR,
    ProviderError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    ProviderError::Upstream { .. }
    | ProviderError::MalformedResponse(_)
    | ProviderError::Transport(_) => StatusCode::BAD_GATEWAY,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Provider { site_id, source } => (
        provider_status(source),
        json!({ "error": source.to_string(), "site_id": site_id }),
      ),
      ApiError::Store(e) => {
        error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provider_errors_map_to_gateway_statuses() {
    let cases = [
      (ProviderError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
      (ProviderError::Unauthenticated, StatusCode::INTERNAL_SERVER_ERROR),
      (
        ProviderError::Upstream { status: 422, message: None },
        StatusCode::BAD_GATEWAY,
      ),
      (ProviderError::Timeout { timeout_secs: 30 }, StatusCode::GATEWAY_TIMEOUT),
      (ProviderError::Transport("refused".into()), StatusCode::BAD_GATEWAY),
    ];
    for (err, expected) in cases {
      assert_eq!(ApiError::from(err).into_response().status(), expected);
    }
  }

  #[test]
  fn provision_errors_keep_their_meaning() {
    let not_found = ApiError::from(ProvisionError::NotFound("9".into()));
    assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);
    let conflict = ApiError::from(ProvisionError::Conflict("dup".into()));
    assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);
    let invalid = ApiError::from(ProvisionError::InvalidArgument("slug".into()));
    assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
  }
}
