//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order in SQL matches chronological order. JSON payloads are
//! stored as compact JSON text.

use chrono::{DateTime, SecondsFormat, Utc};
use siteforge_core::{
  history::{HistoryEntry, HistoryEvent},
  site::{OwnerRef, SiteAccess, SiteRecord, SiteStatus},
  store::SiteChange,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn encode_json(value: &serde_json::Value) -> String { value.to_string() }

pub fn decode_json(s: &str) -> Result<serde_json::Value> {
  Ok(serde_json::from_str(s)?)
}

// ─── SiteStatus ──────────────────────────────────────────────────────────────

pub fn encode_status(status: SiteStatus) -> &'static str {
  match status {
    SiteStatus::Creating => "creating",
    SiteStatus::Progress => "progress",
    SiteStatus::Completed => "completed",
    SiteStatus::Failed => "failed",
    SiteStatus::Expired => "expired",
  }
}

/// `'creating', 'progress'`, for inlining into an `IN (...)` clause. Only
/// ever built from the closed set above, never from caller text.
pub fn status_list(statuses: &[SiteStatus]) -> String {
  statuses
    .iter()
    .map(|s| format!("'{}'", encode_status(*s)))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Changes ─────────────────────────────────────────────────────────────────

/// Column values written by a [`SiteChange`].
pub struct ChangeColumns {
  pub status:        &'static str,
  pub task_id:       Option<String>,
  pub access:        SiteAccess,
  pub is_pool:       Option<bool>,
  pub error_message: Option<String>,
}

impl From<SiteChange> for ChangeColumns {
  fn from(change: SiteChange) -> Self {
    let status = encode_status(change.status());
    match change {
      SiteChange::Progress { task_id, is_pool } => Self {
        status,
        task_id,
        access: SiteAccess::default(),
        is_pool,
        error_message: None,
      },
      SiteChange::Completed { access, is_pool } => Self {
        status,
        task_id: None,
        access,
        is_pool,
        error_message: None,
      },
      SiteChange::Failed { reason } => Self {
        status,
        task_id: None,
        access: SiteAccess::default(),
        is_pool: None,
        error_message: Some(reason),
      },
      SiteChange::Expired => Self {
        status,
        task_id: None,
        access: SiteAccess::default(),
        is_pool: None,
        error_message: None,
      },
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawSite`].
pub const SITE_COLUMNS: &str = "
  site_id, status, task_id,
  site_url, admin_username, admin_password, admin_url, session_hash,
  is_pool, is_reserved, is_shared, expiry_hours, expires_at,
  template_slug, plan_id, order_id, user_id, source,
  raw_response, error_message, created_at, updated_at";

/// Raw values read directly from a `sites` row.
pub struct RawSite {
  pub site_id:        String,
  pub status:         String,
  pub task_id:        Option<String>,
  pub site_url:       Option<String>,
  pub admin_username: Option<String>,
  pub admin_password: Option<String>,
  pub admin_url:      Option<String>,
  pub session_hash:   Option<String>,
  pub is_pool:        Option<bool>,
  pub is_reserved:    bool,
  pub is_shared:      bool,
  pub expiry_hours:   Option<u32>,
  pub expires_at:     Option<String>,
  pub template_slug:  String,
  pub plan_id:        Option<i64>,
  pub order_id:       Option<String>,
  pub user_id:        Option<String>,
  pub source:         Option<String>,
  pub raw_response:   Option<String>,
  pub error_message:  Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawSite {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      site_id:        row.get(0)?,
      status:         row.get(1)?,
      task_id:        row.get(2)?,
      site_url:       row.get(3)?,
      admin_username: row.get(4)?,
      admin_password: row.get(5)?,
      admin_url:      row.get(6)?,
      session_hash:   row.get(7)?,
      is_pool:        row.get(8)?,
      is_reserved:    row.get(9)?,
      is_shared:      row.get(10)?,
      expiry_hours:   row.get(11)?,
      expires_at:     row.get(12)?,
      template_slug:  row.get(13)?,
      plan_id:        row.get(14)?,
      order_id:       row.get(15)?,
      user_id:        row.get(16)?,
      source:         row.get(17)?,
      raw_response:   row.get(18)?,
      error_message:  row.get(19)?,
      created_at:     row.get(20)?,
      updated_at:     row.get(21)?,
    })
  }

  pub fn into_record(self) -> Result<SiteRecord> {
    Ok(SiteRecord {
      status:        SiteStatus::parse(&self.status)?,
      site_id:       self.site_id,
      task_id:       self.task_id,
      access:        SiteAccess {
        site_url:       self.site_url,
        admin_username: self.admin_username,
        admin_password: self.admin_password,
        admin_url:      self.admin_url,
        session_hash:   self.session_hash,
      },
      is_pool:       self.is_pool,
      is_reserved:   self.is_reserved,
      is_shared:     self.is_shared,
      expiry_hours:  self.expiry_hours,
      expires_at:    self.expires_at.as_deref().map(decode_dt).transpose()?,
      template_slug: self.template_slug,
      plan_id:       self.plan_id.map(|p| p as u64),
      owner:         OwnerRef {
        order_id: self.order_id,
        user_id:  self.user_id,
        source:   self.source,
      },
      raw_response:  self.raw_response.as_deref().map(decode_json).transpose()?,
      error_message: self.error_message,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `site_history` row.
pub struct RawHistoryEntry {
  pub entry_id:    String,
  pub site_id:     String,
  pub event:       String,
  pub payload:     String,
  pub recorded_at: String,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      entry_id:    uuid::Uuid::parse_str(&self.entry_id)?,
      site_id:     self.site_id,
      event:       HistoryEvent::parse(&self.event)?,
      payload:     decode_json(&self.payload)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
