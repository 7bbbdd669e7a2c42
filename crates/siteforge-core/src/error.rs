//! Error types for `siteforge-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown site status: {0:?}")]
  UnknownSiteStatus(String),

  #[error("unknown history event: {0:?}")]
  UnknownHistoryEvent(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
