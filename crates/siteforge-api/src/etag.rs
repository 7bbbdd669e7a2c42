//! ETag computation for site records.
//!
//! An ETag is the SHA-256 of `(site_id, status, updated_at)`. Every write to a
//! record bumps `updated_at`, so any change yields a new tag.

use sha2::{Digest, Sha256};
use siteforge_core::site::SiteRecord;

/// Quoted ETag for `record`.
pub fn site_etag(record: &SiteRecord) -> String {
  let mut hasher = Sha256::new();
  hasher.update(record.site_id.as_bytes());
  hasher.update([0]);
  hasher.update(record.status.to_string().as_bytes());
  hasher.update([0]);
  hasher.update(record.updated_at.timestamp_micros().to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Whether an `If-None-Match` header value matches `etag`. Accepts `*`,
/// comma-separated lists, weak tags and unquoted tags.
pub fn if_none_match(header: &str, etag: &str) -> bool {
  let bare = etag.trim_matches('"');
  header.split(',').map(str::trim).any(|candidate| {
    let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
    candidate == "*" || candidate.trim_matches('"') == bare
  })
}
