//! Error type for `siteforge-store-sqlite`.

use siteforge_core::site::SiteStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] siteforge_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("site not found: {0}")]
  SiteNotFound(String),

  /// A re-key target that another record already uses.
  #[error("site id {0} is already taken")]
  SiteIdTaken(String),

  /// Re-keying is only valid while the record is still `creating`.
  #[error("site {site_id} is {status}, expected creating")]
  NotCreating { site_id: String, status: SiteStatus },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
