//! Append-only history of what happened to a site.
//!
//! Every status transition and plan change appends one entry. Entries are
//! never updated or removed (short of deleting the site itself) and follow
//! their record through a placeholder re-key.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// What a history entry records.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryEvent {
  Created,
  CreationResponse,
  CreationFailed,
  TaskProgress,
  TaskCompleted,
  TaskFailed,
  DetailsFetched,
  DetailsFailed,
  Expired,
  Stale,
  PlanChanged,
}

impl HistoryEvent {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownHistoryEvent(s.to_owned()))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub entry_id:    Uuid,
  pub site_id:     String,
  pub event:       HistoryEvent,
  pub payload:     serde_json::Value,
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::SiteStore::append_history`].
/// `entry_id` and `recorded_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
  pub site_id: String,
  pub event:   HistoryEvent,
  pub payload: serde_json::Value,
}

impl NewHistoryEntry {
  pub fn new(
    site_id: impl Into<String>,
    event: HistoryEvent,
    payload: serde_json::Value,
  ) -> Self {
    Self { site_id: site_id.into(), event, payload }
  }
}
