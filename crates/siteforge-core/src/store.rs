//! The `SiteStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `siteforge-store-sqlite`). The provisioning engine depends on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use crate::{
  history::{HistoryEntry, NewHistoryEntry},
  site::{NewSite, SiteAccess, SiteRecord, SiteStatus},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`SiteStore::list_by_owner`]. Set fields are ANDed; an
/// empty query matches every site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerQuery {
  pub order_id: Option<String>,
  pub user_id:  Option<String>,
  pub source:   Option<String>,
}

impl OwnerQuery {
  pub fn order(order_id: impl Into<String>) -> Self {
    Self { order_id: Some(order_id.into()), ..Self::default() }
  }

  pub fn user(user_id: impl Into<String>) -> Self {
    Self { user_id: Some(user_id.into()), ..Self::default() }
  }
}

// ─── Changes ─────────────────────────────────────────────────────────────────

/// A lifecycle transition to write. Each variant fixes which columns are set
/// so the task-id and credential invariants hold by construction: the task
/// id survives only into `Progress`, credentials only into `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteChange {
  Progress {
    task_id: Option<String>,
    is_pool: Option<bool>,
  },
  Completed {
    access:  SiteAccess,
    /// `None` keeps whatever the record already says.
    is_pool: Option<bool>,
  },
  Failed {
    reason: String,
  },
  Expired,
}

impl SiteChange {
  pub fn status(&self) -> SiteStatus {
    match self {
      Self::Progress { .. } => SiteStatus::Progress,
      Self::Completed { .. } => SiteStatus::Completed,
      Self::Failed { .. } => SiteStatus::Failed,
      Self::Expired => SiteStatus::Expired,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a siteforge record store backend.
///
/// Every status write is a compare-and-set on the current status, so two
/// writers racing over one record cannot both move it. History is
/// append-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SiteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Records ───────────────────────────────────────────────────────────

  /// Persist a fresh record in [`SiteStatus::Creating`] under `site_id`
  /// (normally a placeholder key).
  fn insert_site(
    &self,
    site_id: String,
    input: NewSite,
  ) -> impl Future<Output = Result<SiteRecord, Self::Error>> + Send + '_;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get_site<'a>(
    &'a self,
    site_id: &'a str,
  ) -> impl Future<Output = Result<Option<SiteRecord>, Self::Error>> + Send + 'a;

  /// Records the reconciler must poll: status `creating` or `progress` with
  /// a task id, oldest first.
  fn list_pending(
    &self,
  ) -> impl Future<Output = Result<Vec<SiteRecord>, Self::Error>> + Send + '_;

  /// Records attributed to an owner, oldest first.
  fn list_by_owner<'a>(
    &'a self,
    query: &'a OwnerQuery,
  ) -> impl Future<Output = Result<Vec<SiteRecord>, Self::Error>> + Send + 'a;

  /// Completed, non-reserved records whose `expires_at` is at or before `now`.
  fn list_expired(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<SiteRecord>, Self::Error>> + Send + '_;

  /// Records still `creating` that were created before `before`.
  fn list_stale_creating(
    &self,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<SiteRecord>, Self::Error>> + Send + '_;

  /// Move a `creating` record from `old_id` to `new_id`, applying `change`
  /// and `raw_response` in the same transaction. History follows the record.
  ///
  /// Fails if `new_id` is already taken or the record has left `creating`.
  fn rekey<'a>(
    &'a self,
    old_id: &'a str,
    new_id: &'a str,
    change: SiteChange,
    raw_response: Option<serde_json::Value>,
  ) -> impl Future<Output = Result<SiteRecord, Self::Error>> + Send + 'a;

  /// Apply `change` only if the record's current status is one of `from`.
  ///
  /// Returns the updated record, or `None` when the record is missing or
  /// another writer already moved it.
  fn transition<'a>(
    &'a self,
    site_id: &'a str,
    from: &'a [SiteStatus],
    change: SiteChange,
    raw_response: Option<serde_json::Value>,
  ) -> impl Future<Output = Result<Option<SiteRecord>, Self::Error>> + Send + 'a;

  /// Record a plan change. Returns `None` if the site does not exist.
  fn set_plan<'a>(
    &'a self,
    site_id: &'a str,
    plan_id: Option<u64>,
  ) -> impl Future<Output = Result<Option<SiteRecord>, Self::Error>> + Send + 'a;

  /// Administrative delete of a record and its history. Does not touch the
  /// provider. Returns `false` if nothing was deleted.
  fn delete_site<'a>(
    &'a self,
    site_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── History ───────────────────────────────────────────────────────────

  fn append_history(
    &self,
    entry: NewHistoryEntry,
  ) -> impl Future<Output = Result<HistoryEntry, Self::Error>> + Send + '_;

  /// All history entries for a site, oldest first.
  fn history<'a>(
    &'a self,
    site_id: &'a str,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + 'a;

  // ── Leases ────────────────────────────────────────────────────────────

  /// Take the named lease for `ttl`. Succeeds when the lease is free,
  /// expired, or already held by `holder` (which renews it).
  fn try_acquire_lease<'a>(
    &'a self,
    name: &'a str,
    holder: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Release the named lease if `holder` owns it.
  fn release_lease<'a>(
    &'a self,
    name: &'a str,
    holder: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
