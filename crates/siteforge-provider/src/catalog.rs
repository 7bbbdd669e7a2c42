//! A time-bounded cache over [`Provider::list_templates`].

use std::{sync::Arc, time::Duration};

use siteforge_core::provider::{Provider, ProviderError, Template};
use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

/// Caches the template list for `ttl`. Errors are never cached, so a failed
/// refresh is retried on the next call.
pub struct TemplateCatalog<P> {
  provider: Arc<P>,
  ttl:      Duration,
  cached:   RwLock<Option<(Instant, Vec<Template>)>>,
}

impl<P: Provider> TemplateCatalog<P> {
  pub fn new(provider: Arc<P>, ttl: Duration) -> Self {
    Self { provider, ttl, cached: RwLock::new(None) }
  }

  pub async fn templates(&self) -> Result<Vec<Template>, ProviderError> {
    if let Some((fetched_at, templates)) = &*self.cached.read().await {
      if fetched_at.elapsed() < self.ttl {
        return Ok(templates.clone());
      }
    }

    let fresh = self.provider.list_templates().await?;
    debug!(count = fresh.len(), "refreshed template catalog");
    *self.cached.write().await = Some((Instant::now(), fresh.clone()));
    Ok(fresh)
  }

  /// Drop the cached list; the next call goes to the provider.
  pub async fn invalidate(&self) { *self.cached.write().await = None; }
}
