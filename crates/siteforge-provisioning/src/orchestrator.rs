//! Site creation: placeholder record, provider call, classification, re-key.

use std::{sync::Arc, time::Duration};

use serde_json::json;
use siteforge_core::{
  history::{HistoryEvent, NewHistoryEntry},
  notify::OwnerNotifier,
  provider::{CreateSiteRequest, CreatedSite, Provider, ProviderError},
  site::{NewSite, SiteRecord, SiteStatus},
  store::{SiteChange, SiteStore},
};
use tracing::{info, warn};

use crate::{
  calls::{bounded, notify},
  error::{ProvisionError, Result},
  ids::placeholder_id,
};

/// Decide what state a creation response puts the record in.
///
/// A response that already carries a usable URL and login wins regardless
/// of `is_pool`; then a pool site; then anything with a task to poll. A
/// response with none of these still lands in `progress`, but with nothing
/// to poll.
pub fn classify(created: &CreatedSite) -> SiteChange {
  if created.access.is_usable() {
    return SiteChange::Completed {
      access:  created.access.clone(),
      is_pool: created.is_pool,
    };
  }
  match (created.is_pool, &created.task_id) {
    (Some(true), _) => SiteChange::Completed {
      access:  created.access.clone(),
      is_pool: Some(true),
    },
    (_, Some(task_id)) => SiteChange::Progress {
      task_id: Some(task_id.clone()),
      is_pool: created.is_pool,
    },
    (is_pool, None) => {
      warn!(
        site_id = created.id.as_deref(),
        ?is_pool,
        "creation response has no task id; the site cannot be polled"
      );
      SiteChange::Progress { task_id: None, is_pool }
    }
  }
}

pub struct Orchestrator<S, P, N> {
  store:        Arc<S>,
  provider:     Arc<P>,
  notifier:     Arc<N>,
  call_timeout: Duration,
}

impl<S, P, N> Orchestrator<S, P, N>
where
  S: SiteStore,
  P: Provider,
  N: OwnerNotifier,
{
  pub fn new(
    store: Arc<S>,
    provider: Arc<P>,
    notifier: Arc<N>,
    call_timeout: Duration,
  ) -> Self {
    Self { store, provider, notifier, call_timeout }
  }

  /// Request a new site from the provider and record it.
  ///
  /// The record exists (as a placeholder) before the provider is called, so
  /// a failed or interrupted call always leaves a trace.
  pub async fn create_site(&self, input: NewSite) -> Result<SiteRecord> {
    if input.template_slug.trim().is_empty() {
      return Err(ProvisionError::InvalidArgument(
        "template_slug is required".into(),
      ));
    }

    let request = CreateSiteRequest {
      template_slug: input.template_slug.clone(),
      plan_id:       input.plan_id,
      is_reserved:   input.is_reserved,
      expiry_hours:  input.expiry_hours,
      is_shared:     input.is_shared,
    };

    let placeholder = placeholder_id();
    self
      .store
      .insert_site(placeholder.clone(), input)
      .await
      .map_err(ProvisionError::store)?;
    self
      .append(&placeholder, HistoryEvent::Created, json!({
        "template_slug": request.template_slug,
        "plan_id": request.plan_id,
        "is_reserved": request.is_reserved,
        "expiry_hours": request.expiry_hours,
      }))
      .await?;
    info!(site_id = %placeholder, template = %request.template_slug, "site requested");

    let created =
      match bounded(self.call_timeout, self.provider.create_site(&request)).await {
        Ok(created) => created,
        Err(err) => return Err(self.fail_creation(&placeholder, err).await),
      };

    let site_id = match created.id.clone() {
      Some(id) => id,
      None => {
        warn!(site_id = %placeholder, "creation response has no site id; keeping placeholder key");
        placeholder.clone()
      }
    };

    if site_id != placeholder
      && self
        .store
        .get_site(&site_id)
        .await
        .map_err(ProvisionError::store)?
        .is_some()
    {
      let reason = format!("provider returned site id {site_id}, which is already recorded");
      self
        .mark_failed(&placeholder, &reason, json!({ "site_id": site_id }))
        .await?;
      return Err(ProvisionError::Conflict(reason));
    }

    let record = self
      .store
      .rekey(&placeholder, &site_id, classify(&created), Some(created.raw.clone()))
      .await
      .map_err(ProvisionError::store)?;
    self
      .append(&record.site_id, HistoryEvent::CreationResponse, json!({
        "placeholder": placeholder,
        "status": record.status,
        "task_id": record.task_id,
        "is_pool": created.is_pool,
      }))
      .await?;
    info!(
      site_id = %record.site_id,
      status = %record.status,
      task_id = record.task_id.as_deref(),
      "site creation accepted"
    );

    if record.status == SiteStatus::Completed {
      let url = record.access.site_url.as_deref().unwrap_or("(no URL reported)");
      notify(&*self.notifier, &record.owner, &format!("Site ready: {url}"), true)
        .await;
    }

    Ok(record)
  }

  /// Turn `err` into the caller's error. Errors raised before any request
  /// reached the provider leave the placeholder as it is; the rest mark it
  /// failed.
  async fn fail_creation(
    &self,
    placeholder: &str,
    err: ProviderError,
  ) -> ProvisionError {
    if matches!(
      err,
      ProviderError::InvalidArgument(_) | ProviderError::Unauthenticated
    ) {
      warn!(site_id = %placeholder, error = %err, "site creation aborted before the provider call");
      return ProvisionError::Provider { site_id: placeholder.to_owned(), source: err };
    }

    warn!(site_id = %placeholder, error = %err, "site creation call failed");
    let payload = json!({ "error": err.to_string() });
    if let Err(store_err) =
      self.mark_failed(placeholder, &err.to_string(), payload).await
    {
      return store_err;
    }
    ProvisionError::Provider { site_id: placeholder.to_owned(), source: err }
  }

  async fn mark_failed(
    &self,
    site_id: &str,
    reason: &str,
    payload: serde_json::Value,
  ) -> Result<()> {
    self
      .store
      .transition(
        site_id,
        &[SiteStatus::Creating],
        SiteChange::Failed { reason: reason.to_owned() },
        None,
      )
      .await
      .map_err(ProvisionError::store)?;
    self
      .append(site_id, HistoryEvent::CreationFailed, json!({
        "reason": reason,
        "response": payload,
      }))
      .await
  }

  async fn append(
    &self,
    site_id: &str,
    event: HistoryEvent,
    payload: serde_json::Value,
  ) -> Result<()> {
    self
      .store
      .append_history(NewHistoryEntry::new(site_id, event, payload))
      .await
      .map_err(ProvisionError::store)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use siteforge_core::site::SiteAccess;

  use super::*;

  fn access() -> SiteAccess {
    SiteAccess {
      site_url: Some("https://a.example".into()),
      admin_username: Some("admin".into()),
      ..SiteAccess::default()
    }
  }

  #[test]
  fn pool_site_completes() {
    let created = CreatedSite {
      is_pool: Some(true),
      task_id: Some("t1".into()),
      ..CreatedSite::default()
    };
    assert!(matches!(
      classify(&created),
      SiteChange::Completed { is_pool: Some(true), .. }
    ));
  }

  #[test]
  fn usable_access_wins_over_is_pool_false() {
    let created = CreatedSite {
      access: access(),
      is_pool: Some(false),
      task_id: Some("t1".into()),
      ..CreatedSite::default()
    };
    assert_eq!(classify(&created), SiteChange::Completed {
      access:  access(),
      is_pool: Some(false),
    });
  }

  #[test]
  fn task_means_progress_whether_or_not_pool_is_known() {
    for is_pool in [Some(false), None] {
      let created = CreatedSite {
        is_pool,
        task_id: Some("t1".into()),
        ..CreatedSite::default()
      };
      assert_eq!(classify(&created), SiteChange::Progress {
        task_id: Some("t1".into()),
        is_pool,
      });
    }
  }

  #[test]
  fn nothing_to_go_on_is_progress_without_task() {
    let created = CreatedSite { is_pool: Some(false), ..CreatedSite::default() };
    assert_eq!(classify(&created), SiteChange::Progress {
      task_id: None,
      is_pool: Some(false),
    });
  }

  #[test]
  fn url_without_username_is_not_enough() {
    let created = CreatedSite {
      access: SiteAccess {
        site_url: Some("https://a.example".into()),
        ..SiteAccess::default()
      },
      task_id: Some("t1".into()),
      ..CreatedSite::default()
    };
    assert!(matches!(classify(&created), SiteChange::Progress { .. }));
  }
}
