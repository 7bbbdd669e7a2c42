//! Housekeeping passes that run alongside the reconciler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use siteforge_core::{
  history::{HistoryEvent, NewHistoryEntry},
  notify::OwnerNotifier,
  site::{SiteRecord, SiteStatus},
  store::{SiteChange, SiteStore},
};
use tracing::{info, warn};

use crate::{calls::notify, error::ReconcileError};

/// Failure reason recorded on records abandoned in `creating`.
pub const STALE_REASON: &str =
  "provisioning interrupted before the provider responded";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
  pub swept:  usize,
  /// Per-record store failures.
  pub errors: usize,
}

/// Move every ephemeral `completed` site whose expiry is at or before `now`
/// to `expired`. Reserved sites are never listed.
pub async fn sweep_expired<S, N>(
  store: &S,
  notifier: &N,
  now: DateTime<Utc>,
) -> Result<SweepReport, ReconcileError>
where
  S: SiteStore,
  N: OwnerNotifier,
{
  let due = store.list_expired(now).await.map_err(ReconcileError::store)?;
  let mut report = SweepReport::default();

  for record in due {
    match expire_one(store, &record).await {
      Ok(true) => {
        report.swept += 1;
        info!(site_id = %record.site_id, "site expired");
        notify(notifier, &record.owner, "Site expired", true).await;
      }
      Ok(false) => {}
      Err(e) => {
        warn!(site_id = %record.site_id, error = %e, "failed to expire site");
        report.errors += 1;
      }
    }
  }
  Ok(report)
}

async fn expire_one<S: SiteStore>(
  store: &S,
  record: &SiteRecord,
) -> Result<bool, S::Error> {
  let moved = store
    .transition(&record.site_id, &[SiteStatus::Completed], SiteChange::Expired, None)
    .await?;
  if moved.is_none() {
    return Ok(false);
  }
  store
    .append_history(NewHistoryEntry::new(
      record.site_id.as_str(),
      HistoryEvent::Expired,
      json!({ "expires_at": record.expires_at }),
    ))
    .await?;
  Ok(true)
}

/// Fail every record still `creating` that was created before `before`.
/// Such a record means the process died between writing the placeholder and
/// recording the provider's answer.
pub async fn sweep_stale<S, N>(
  store: &S,
  notifier: &N,
  before: DateTime<Utc>,
) -> Result<SweepReport, ReconcileError>
where
  S: SiteStore,
  N: OwnerNotifier,
{
  let stale = store
    .list_stale_creating(before)
    .await
    .map_err(ReconcileError::store)?;
  let mut report = SweepReport::default();

  for record in stale {
    match fail_stale(store, &record).await {
      Ok(true) => {
        report.swept += 1;
        warn!(site_id = %record.site_id, created_at = %record.created_at, "abandoned site creation marked failed");
        notify(
          notifier,
          &record.owner,
          &format!("Site provisioning failed: {STALE_REASON}"),
          false,
        )
        .await;
      }
      Ok(false) => {}
      Err(e) => {
        warn!(site_id = %record.site_id, error = %e, "failed to sweep stale site");
        report.errors += 1;
      }
    }
  }
  Ok(report)
}

async fn fail_stale<S: SiteStore>(
  store: &S,
  record: &SiteRecord,
) -> Result<bool, S::Error> {
  let change = SiteChange::Failed { reason: STALE_REASON.to_owned() };
  let moved = store
    .transition(&record.site_id, &[SiteStatus::Creating], change, None)
    .await?;
  if moved.is_none() {
    return Ok(false);
  }
  store
    .append_history(NewHistoryEntry::new(
      record.site_id.as_str(),
      HistoryEvent::Stale,
      json!({ "created_at": record.created_at }),
    ))
    .await?;
  Ok(true)
}
