//! The scheduled tick that advances records with an outstanding provider
//! task.
//!
//! Each tick runs alone: a tick that finds another one in flight, in this
//! process or behind the `reconciler` lease, is skipped. It then lists
//! pending records and polls every task once, concurrently but bounded. A poll that fails is logged and
//! retried on the next tick; it never fails the record. A task the provider
//! reports finished triggers exactly one detail fetch, and the record is
//! finalised whether or not that fetch succeeds.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::json;
use siteforge_core::{
  history::{HistoryEvent, NewHistoryEntry},
  notify::OwnerNotifier,
  provider::{Provider, TaskStatus},
  site::{SiteRecord, SiteStatus, is_placeholder_id},
  status::{TaskState, map_status},
  store::{SiteChange, SiteStore},
};
use tokio::{
  sync::{Mutex, Semaphore},
  task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::{
  calls::{bounded, notify},
  config::ProvisioningConfig,
  error::ReconcileError,
};

/// Name of the lease row that keeps ticks from overlapping.
pub const LEASE_NAME: &str = "reconciler";

const PENDING: &[SiteStatus] = &[SiteStatus::Creating, SiteStatus::Progress];

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
  /// Another holder owned the lease; nothing was polled.
  pub skipped:       bool,
  pub polled:        usize,
  pub completed:     usize,
  pub failed:        usize,
  pub still_pending: usize,
  /// Polls that got no usable answer from the provider.
  pub unreachable:   usize,
  /// Per-record store failures.
  pub errors:        usize,
}

impl TickReport {
  fn record(&mut self, outcome: PollOutcome) {
    self.polled += 1;
    match outcome {
      PollOutcome::Completed => self.completed += 1,
      PollOutcome::Failed => self.failed += 1,
      PollOutcome::StillPending | PollOutcome::Superseded => {
        self.still_pending += 1
      }
      PollOutcome::Unreachable => self.unreachable += 1,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
  StillPending,
  Completed,
  Failed,
  Unreachable,
  /// The record left the pending set while its poll was in flight.
  Superseded,
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

pub struct Reconciler<S, P, N> {
  poller:  Poller<S, P, N>,
  config:  ProvisioningConfig,
  /// Held for the whole tick. The store lease is re-entrant for one
  /// holder, so ticks sharing this reconciler are kept apart here.
  running: Mutex<()>,
}

impl<S, P, N> Reconciler<S, P, N>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  pub fn new(
    store: Arc<S>,
    provider: Arc<P>,
    notifier: Arc<N>,
    config: ProvisioningConfig,
  ) -> Self {
    let poller = Poller {
      store,
      provider,
      notifier,
      call_timeout: config.call_timeout,
    };
    Self { poller, config, running: Mutex::new(()) }
  }

  /// Run one reconciliation pass.
  pub async fn tick(&self) -> Result<TickReport, ReconcileError> {
    let Ok(_running) = self.running.try_lock() else {
      info!("reconciliation tick already running, skipping");
      return Ok(TickReport { skipped: true, ..TickReport::default() });
    };

    let store = &self.poller.store;
    let ttl = chrono::Duration::from_std(self.config.lease_ttl)
      .unwrap_or_else(|_| chrono::Duration::minutes(5));

    let acquired = store
      .try_acquire_lease(LEASE_NAME, &self.config.holder, ttl)
      .await
      .map_err(ReconcileError::store)?;
    if !acquired {
      info!("reconciler lease held elsewhere, skipping tick");
      return Ok(TickReport { skipped: true, ..TickReport::default() });
    }

    let result = self.poll_pending().await;

    if let Err(e) = store.release_lease(LEASE_NAME, &self.config.holder).await {
      warn!(error = %e, "failed to release reconciler lease");
    }
    result
  }

  async fn poll_pending(&self) -> Result<TickReport, ReconcileError> {
    let pending = self
      .poller
      .store
      .list_pending()
      .await
      .map_err(ReconcileError::store)?;

    let mut report = TickReport::default();
    if pending.is_empty() {
      debug!("no pending sites");
      return Ok(report);
    }

    let permits = Arc::new(Semaphore::new(self.config.max_concurrent_polls.max(1)));
    let mut polls = JoinSet::new();
    for record in pending {
      let poller = self.poller.clone();
      let permits = Arc::clone(&permits);
      polls.spawn(async move {
        let _permit = permits.acquire_owned().await.ok();
        poller.poll(record).await
      });
    }

    while let Some(joined) = polls.join_next().await {
      match joined {
        Ok(Ok(outcome)) => report.record(outcome),
        Ok(Err(e)) => {
          warn!(error = %e, "store failure while reconciling a site");
          report.errors += 1;
        }
        Err(e) => {
          error!(error = %e, "poll task aborted");
          report.errors += 1;
        }
      }
    }

    info!(
      polled = report.polled,
      completed = report.completed,
      failed = report.failed,
      unreachable = report.unreachable,
      errors = report.errors,
      "reconciliation tick finished"
    );
    Ok(report)
  }
}

// ─── Poller ──────────────────────────────────────────────────────────────────

/// Everything one poll task needs, cheap to clone into it.
struct Poller<S, P, N> {
  store:        Arc<S>,
  provider:     Arc<P>,
  notifier:     Arc<N>,
  call_timeout: Duration,
}

impl<S, P, N> Clone for Poller<S, P, N> {
  fn clone(&self) -> Self {
    Self {
      store:        Arc::clone(&self.store),
      provider:     Arc::clone(&self.provider),
      notifier:     Arc::clone(&self.notifier),
      call_timeout: self.call_timeout,
    }
  }
}

impl<S, P, N> Poller<S, P, N>
where
  S: SiteStore,
  P: Provider,
  N: OwnerNotifier,
{
  async fn poll(&self, record: SiteRecord) -> Result<PollOutcome, ReconcileError> {
    let Some(task_id) = record.task_id.clone() else {
      return Ok(PollOutcome::StillPending);
    };

    let status =
      match bounded(self.call_timeout, self.provider.task_status(&task_id)).await {
        Ok(status) => status,
        Err(err) => {
          warn!(
            site_id = %record.site_id,
            %task_id,
            error = %err,
            transient = err.is_transient(),
            "task poll failed, retrying next tick"
          );
          return Ok(PollOutcome::Unreachable);
        }
      };

    let state = match &status.status {
      Some(raw) => map_status(raw),
      None => {
        warn!(site_id = %record.site_id, %task_id, "task status carried no status");
        TaskState::Progress
      }
    };

    match state {
      TaskState::Progress => self.still_running(&record, &task_id, &status).await,
      TaskState::Completed => self.complete(&record, &task_id, status).await,
      TaskState::Failed => self.fail(&record, &task_id, status).await,
    }
  }

  async fn still_running(
    &self,
    record: &SiteRecord,
    task_id: &str,
    status: &TaskStatus,
  ) -> Result<PollOutcome, ReconcileError> {
    debug!(site_id = %record.site_id, task_id, "task still running");
    if record.status != SiteStatus::Creating {
      return Ok(PollOutcome::StillPending);
    }

    let change = SiteChange::Progress {
      task_id: Some(task_id.to_owned()),
      is_pool: None,
    };
    let moved = self
      .store
      .transition(&record.site_id, &[SiteStatus::Creating], change, None)
      .await
      .map_err(ReconcileError::store)?;
    if moved.is_some() {
      self
        .append(&record.site_id, HistoryEvent::TaskProgress, json!({
          "task_id": task_id,
          "message": status.message,
        }))
        .await?;
    }
    Ok(PollOutcome::StillPending)
  }

  async fn complete(
    &self,
    record: &SiteRecord,
    task_id: &str,
    status: TaskStatus,
  ) -> Result<PollOutcome, ReconcileError> {
    // A placeholder key is not a provider id; there is nothing to look up.
    let resource_id = status.resource_id.clone().or_else(|| {
      (!is_placeholder_id(&record.site_id)).then(|| record.site_id.clone())
    });

    let (access, details_raw, detail_error) = match &resource_id {
      Some(resource_id) => {
        match bounded(self.call_timeout, self.provider.site_details(resource_id))
          .await
        {
          Ok(details) => {
            (details.access.or(record.access.clone()), details.raw, None)
          }
          Err(err) => {
            warn!(
              site_id = %record.site_id,
              %resource_id,
              error = %err,
              "task completed but site details could not be fetched"
            );
            (record.access.clone(), serde_json::Value::Null, Some(err.to_string()))
          }
        }
      }
      None => {
        warn!(
          site_id = %record.site_id,
          %task_id,
          "task completed without a provider site id, skipping detail fetch"
        );
        (
          record.access.clone(),
          serde_json::Value::Null,
          Some("no provider site id to fetch details for".to_owned()),
        )
      }
    };

    let ready = access.is_usable();
    let url = access.site_url.clone();
    let raw = json!({ "task": status.raw, "details": details_raw });
    let change = SiteChange::Completed { access, is_pool: None };
    let Some(updated) = self
      .store
      .transition(&record.site_id, PENDING, change, Some(raw))
      .await
      .map_err(ReconcileError::store)?
    else {
      debug!(site_id = %record.site_id, "site moved on during poll");
      return Ok(PollOutcome::Superseded);
    };

    self
      .append(&updated.site_id, HistoryEvent::TaskCompleted, json!({
        "task_id": task_id,
        "resource_id": resource_id,
      }))
      .await?;
    match &detail_error {
      None => {
        self
          .append(&updated.site_id, HistoryEvent::DetailsFetched, json!({
            "resource_id": resource_id,
          }))
          .await?
      }
      Some(err) => {
        self
          .append(&updated.site_id, HistoryEvent::DetailsFailed, json!({
            "resource_id": resource_id,
            "error": err,
          }))
          .await?
      }
    }
    info!(site_id = %updated.site_id, ready, "site provisioning completed");

    let note = match (ready, url) {
      (true, Some(url)) => format!("Site ready: {url}"),
      _ => "Site provisioning finished, but access details are not available yet"
        .to_owned(),
    };
    notify(&*self.notifier, &updated.owner, &note, ready).await;
    Ok(PollOutcome::Completed)
  }

  async fn fail(
    &self,
    record: &SiteRecord,
    task_id: &str,
    status: TaskStatus,
  ) -> Result<PollOutcome, ReconcileError> {
    let reason = status
      .message
      .clone()
      .unwrap_or_else(|| format!("provider task {task_id} failed"));

    let change = SiteChange::Failed { reason: reason.clone() };
    let Some(updated) = self
      .store
      .transition(&record.site_id, PENDING, change, Some(status.raw))
      .await
      .map_err(ReconcileError::store)?
    else {
      debug!(site_id = %record.site_id, "site moved on during poll");
      return Ok(PollOutcome::Superseded);
    };

    self
      .append(&updated.site_id, HistoryEvent::TaskFailed, json!({
        "task_id": task_id,
        "message": reason,
      }))
      .await?;
    warn!(site_id = %updated.site_id, %task_id, %reason, "site provisioning failed");

    notify(
      &*self.notifier,
      &updated.owner,
      &format!("Site provisioning failed: {reason}"),
      false,
    )
    .await;
    Ok(PollOutcome::Failed)
  }

  async fn append(
    &self,
    site_id: &str,
    event: HistoryEvent,
    payload: serde_json::Value,
  ) -> Result<(), ReconcileError> {
    self
      .store
      .append_history(NewHistoryEntry::new(site_id, event, payload))
      .await
      .map_err(ReconcileError::store)?;
    Ok(())
  }
}
