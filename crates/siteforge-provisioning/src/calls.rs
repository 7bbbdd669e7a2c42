//! Small helpers shared by the orchestrator, the reconciler and the sweeps.

use std::{future::Future, time::Duration};

use siteforge_core::{
  notify::OwnerNotifier, provider::ProviderError, site::OwnerRef,
};
use tracing::warn;

/// Run a provider call under an outer deadline, reporting expiry as
/// [`ProviderError::Timeout`].
pub async fn bounded<T>(
  limit: Duration,
  call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
  tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
    Err(ProviderError::Timeout { timeout_secs: limit.as_secs() })
  })
}

/// Append an owner note. Failures are logged and otherwise ignored.
pub async fn notify<N: OwnerNotifier>(
  notifier: &N,
  owner: &OwnerRef,
  text: &str,
  visible_to_customer: bool,
) {
  if let Err(e) = notifier.append_note(owner, text, visible_to_customer).await {
    warn!(error = %e, order_id = owner.order_id.as_deref(), "owner notification failed");
  }
}
