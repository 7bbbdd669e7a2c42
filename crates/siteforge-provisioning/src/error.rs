//! Error types for `siteforge-provisioning`.

use siteforge_core::provider::ProviderError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the request-facing operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("site not found: {0}")]
  NotFound(String),

  /// The provider returned an id that another record already holds.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The creation call failed. `site_id` is the record that was marked
  /// failed.
  #[error("provider call for site {site_id} failed: {source}")]
  Provider {
    site_id: String,
    #[source]
    source:  ProviderError,
  },

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl ProvisionError {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

/// Errors that abort a whole reconciliation or sweep pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl ReconcileError {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<ReconcileError> for ProvisionError {
  fn from(err: ReconcileError) -> Self {
    match err {
      ReconcileError::Store(e) => Self::Store(e),
    }
  }
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
