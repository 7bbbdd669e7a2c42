//! [`SiteService`]: the single entry point used by the HTTP API and the
//! scheduler.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use siteforge_core::{
  history::{HistoryEntry, HistoryEvent, NewHistoryEntry},
  notify::OwnerNotifier,
  provider::Provider,
  site::{NewSite, SiteRecord},
  store::{OwnerQuery, SiteStore},
};
use tracing::info;

use crate::{
  config::ProvisioningConfig,
  error::{ProvisionError, ReconcileError, Result},
  orchestrator::Orchestrator,
  reconciler::{Reconciler, TickReport},
  sweep::{self, SweepReport},
};

pub struct SiteService<S, P, N> {
  store:        Arc<S>,
  notifier:     Arc<N>,
  orchestrator: Orchestrator<S, P, N>,
  reconciler:   Reconciler<S, P, N>,
  config:       ProvisioningConfig,
}

impl<S, P, N> SiteService<S, P, N>
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
    let orchestrator = Orchestrator::new(
      Arc::clone(&store),
      Arc::clone(&provider),
      Arc::clone(&notifier),
      config.call_timeout,
    );
    let reconciler = Reconciler::new(
      Arc::clone(&store),
      provider,
      Arc::clone(&notifier),
      config.clone(),
    );
    Self { store, notifier, orchestrator, reconciler, config }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ─── Records ───────────────────────────────────────────────────────────────

  pub async fn create_site(&self, input: NewSite) -> Result<SiteRecord> {
    self.orchestrator.create_site(input).await
  }

  pub async fn get_site(&self, site_id: &str) -> Result<SiteRecord> {
    self
      .store
      .get_site(site_id)
      .await
      .map_err(ProvisionError::store)?
      .ok_or_else(|| ProvisionError::NotFound(site_id.to_owned()))
  }

  pub async fn list_sites_by_owner(
    &self,
    query: &OwnerQuery,
  ) -> Result<Vec<SiteRecord>> {
    self.store.list_by_owner(query).await.map_err(ProvisionError::store)
  }

  /// Remove a record and its history. The provider is not contacted.
  pub async fn delete_site(&self, site_id: &str) -> Result<()> {
    let deleted = self
      .store
      .delete_site(site_id)
      .await
      .map_err(ProvisionError::store)?;
    if !deleted {
      return Err(ProvisionError::NotFound(site_id.to_owned()));
    }
    info!(site_id, "site record deleted");
    Ok(())
  }

  // ─── History ───────────────────────────────────────────────────────────────

  pub async fn site_history(&self, site_id: &str) -> Result<Vec<HistoryEntry>> {
    self.get_site(site_id).await?;
    self.store.history(site_id).await.map_err(ProvisionError::store)
  }

  /// Record an upgrade or adjustment of the site's plan.
  pub async fn record_plan_change(
    &self,
    site_id: &str,
    plan_id: Option<u64>,
  ) -> Result<SiteRecord> {
    let before = self.get_site(site_id).await?;
    let updated = self
      .store
      .set_plan(site_id, plan_id)
      .await
      .map_err(ProvisionError::store)?
      .ok_or_else(|| ProvisionError::NotFound(site_id.to_owned()))?;
    self
      .store
      .append_history(NewHistoryEntry::new(site_id, HistoryEvent::PlanChanged, json!({
        "from": before.plan_id,
        "to": plan_id,
      })))
      .await
      .map_err(ProvisionError::store)?;
    info!(site_id, ?plan_id, "site plan changed");
    Ok(updated)
  }

  // ─── Scheduled work ────────────────────────────────────────────────────────

  pub async fn tick(&self) -> Result<TickReport, ReconcileError> {
    self.reconciler.tick().await
  }

  pub async fn sweep_expired(&self) -> Result<SweepReport, ReconcileError> {
    sweep::sweep_expired(&*self.store, &*self.notifier, Utc::now()).await
  }

  pub async fn sweep_stale(&self) -> Result<SweepReport, ReconcileError> {
    let age = chrono::Duration::from_std(self.config.stale_after)
      .unwrap_or_else(|_| chrono::Duration::minutes(30));
    sweep::sweep_stale(&*self.store, &*self.notifier, Utc::now() - age).await
  }
}
