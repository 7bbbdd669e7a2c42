//! The periodic timer that drives reconciliation and the sweeps.

use std::{sync::Arc, time::Duration};

use siteforge_core::{notify::OwnerNotifier, provider::Provider, store::SiteStore};
use siteforge_provisioning::{SiteService, SweepReport, TickReport};
use tokio::{
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};
use tracing::{error, info};

/// What one scheduler pass did. A `None` report means that step failed and
/// was logged.
#[derive(Debug, Default)]
pub struct PassReport {
  pub tick:    Option<TickReport>,
  pub expired: Option<SweepReport>,
  pub stale:   Option<SweepReport>,
}

/// Reconcile, then sweep expired and abandoned records. Each step runs even
/// if an earlier one failed.
pub async fn run_once<S, P, N>(service: &SiteService<S, P, N>) -> PassReport
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  let tick = service
    .tick()
    .await
    .inspect_err(|e| error!(error = %e, "reconciliation tick failed"))
    .ok();
  let expired = service
    .sweep_expired()
    .await
    .inspect_err(|e| error!(error = %e, "expiry sweep failed"))
    .ok();
  let stale = service
    .sweep_stale()
    .await
    .inspect_err(|e| error!(error = %e, "stale sweep failed"))
    .ok();
  PassReport { tick, expired, stale }
}

/// Spawn the scheduler loop. The first pass runs immediately; a pass that
/// overruns the period delays the next one instead of bunching them up.
pub fn spawn<S, P, N>(
  service: Arc<SiteService<S, P, N>>,
  every: Duration,
) -> JoinHandle<()>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  tokio::spawn(async move {
    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(every_secs = every.as_secs(), "scheduler started");
    loop {
      timer.tick().await;
      run_once(&service).await;
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tests::{held_lease_service, service};

  #[tokio::test]
  async fn pass_runs_every_step() {
    let service = service().await;

    let report = run_once(&service).await;

    let tick = report.tick.unwrap();
    assert!(!tick.skipped);
    assert_eq!(tick.polled, 0);
    assert_eq!(report.expired, Some(SweepReport::default()));
    assert_eq!(report.stale, Some(SweepReport::default()));
  }

  #[tokio::test]
  async fn held_lease_skips_the_tick_but_still_sweeps() {
    let service = held_lease_service().await;

    let report = run_once(&service).await;

    assert!(report.tick.unwrap().skipped);
    assert!(report.expired.is_some());
    assert!(report.stale.is_some());
  }
}
