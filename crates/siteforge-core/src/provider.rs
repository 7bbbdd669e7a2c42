//! The `Provider` trait and the normalised shapes of its responses.
//!
//! The concrete HTTP implementation lives in `siteforge-provider`. Response
//! types here are already normalised: envelope unwrapped, ids coerced to
//! strings, status kept as a [`RawStatus`] for the mapper.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{site::SiteAccess, status::RawStatus};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Every way a provider call can fail, collapsed into one channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
  /// A required identifier was empty. No request was sent.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// No API key is configured. No request was built.
  #[error("provider API key is not configured")]
  Unauthenticated,

  /// The provider answered with a non-2xx status.
  #[error(
    "provider returned HTTP {status}: {}",
    .message.as_deref().unwrap_or("no message")
  )]
  Upstream { status: u16, message: Option<String> },

  /// A 2xx response whose body could not be decoded.
  #[error("malformed provider response: {0}")]
  MalformedResponse(String),

  #[error("provider call timed out after {timeout_secs}s")]
  Timeout { timeout_secs: u64 },

  /// Connection refused, DNS failure, TLS failure and the like.
  #[error("transport error: {0}")]
  Transport(String),
}

impl ProviderError {
  /// Whether asking again later might succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Timeout { .. } | Self::Transport(_) => true,
      Self::Upstream { status, .. } => *status >= 500,
      _ => false,
    }
  }
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// JSON body of the creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSiteRequest {
  pub template_slug: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub plan_id:       Option<u64>,
  pub is_reserved:   bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expiry_hours:  Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_shared:     Option<bool>,
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// The provider's answer to a creation call.
#[derive(Debug, Clone, Default)]
pub struct CreatedSite {
  /// Provider-assigned site id. Missing only on misbehaving deployments.
  pub id:       Option<String>,
  /// URL and credentials, present on the pool fast path.
  pub access:   SiteAccess,
  pub task_id:  Option<String>,
  pub status:   Option<RawStatus>,
  pub is_pool:  Option<bool>,
  /// The undecoded payload, kept for diagnostics.
  pub raw:      serde_json::Value,
}

/// The provider's answer to a task-status poll. Never carries credentials.
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
  pub status:      Option<RawStatus>,
  /// Id of the site the task produced, when the provider reports it.
  pub resource_id: Option<String>,
  pub message:     Option<String>,
  pub raw:         serde_json::Value,
}

/// Authoritative URL and credentials for a finished site.
#[derive(Debug, Clone, Default)]
pub struct SiteDetails {
  pub access: SiteAccess,
  pub raw:    serde_json::Value,
}

/// A site template offered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
  pub slug: String,
  pub name: String,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the remote site provider.
///
/// Implementations perform no retries and touch no local state; retrying is
/// the reconciler's job, by polling again on its next tick.
pub trait Provider: Send + Sync {
  /// Ask the provider to create a site from a template.
  fn create_site<'a>(
    &'a self,
    request: &'a CreateSiteRequest,
  ) -> impl Future<Output = Result<CreatedSite, ProviderError>> + Send + 'a;

  /// Poll an asynchronous creation task.
  fn task_status<'a>(
    &'a self,
    task_id: &'a str,
  ) -> impl Future<Output = Result<TaskStatus, ProviderError>> + Send + 'a;

  /// Fetch URL and credentials for a finished site.
  fn site_details<'a>(
    &'a self,
    resource_id: &'a str,
  ) -> impl Future<Output = Result<SiteDetails, ProviderError>> + Send + 'a;

  /// List the templates sites can be created from.
  fn list_templates(
    &self,
  ) -> impl Future<Output = Result<Vec<Template>, ProviderError>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_request_omits_unset_optionals() {
    let req = CreateSiteRequest {
      template_slug: "shop".into(),
      plan_id:       None,
      is_reserved:   false,
      expiry_hours:  Some(8),
      is_shared:     None,
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "template_slug": "shop",
        "is_reserved": false,
        "expiry_hours": 8
      })
    );
  }

  #[test]
  fn transient_classification() {
    assert!(ProviderError::Timeout { timeout_secs: 30 }.is_transient());
    assert!(
      ProviderError::Upstream { status: 503, message: None }.is_transient()
    );
    assert!(
      !ProviderError::Upstream { status: 422, message: None }.is_transient()
    );
    assert!(!ProviderError::Unauthenticated.is_transient());
  }

  #[test]
  fn upstream_message_in_display() {
    let err = ProviderError::Upstream {
      status:  404,
      message: Some("template not found".into()),
    };
    assert_eq!(
      err.to_string(),
      "provider returned HTTP 404: template not found"
    );
  }
}
