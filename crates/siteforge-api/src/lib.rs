//! JSON REST API for siteforge.
//!
//! Exposes an axum [`Router`] backed by a [`SiteService`] and a
//! [`TemplateCatalog`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", siteforge_api::api_router(service, catalog))
//! ```

pub mod error;
pub mod etag;
pub mod reconcile;
pub mod sites;
pub mod templates;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use siteforge_core::{notify::OwnerNotifier, provider::Provider, store::SiteStore};
use siteforge_provider::TemplateCatalog;
use siteforge_provisioning::SiteService;

pub use error::ApiError;

/// Shared handler state.
pub struct ApiState<S, P, N> {
  pub service: Arc<SiteService<S, P, N>>,
  pub catalog: Arc<TemplateCatalog<P>>,
}

impl<S, P, N> Clone for ApiState<S, P, N> {
  fn clone(&self) -> Self {
    Self {
      service: Arc::clone(&self.service),
      catalog: Arc::clone(&self.catalog),
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P, N>(
  service: Arc<SiteService<S, P, N>>,
  catalog: Arc<TemplateCatalog<P>>,
) -> Router<()>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  Router::new()
    // Sites
    .route("/sites", get(sites::list::<S, P, N>).post(sites::create::<S, P, N>))
    .route(
      "/sites/{id}",
      get(sites::get_one::<S, P, N>).delete(sites::delete_one::<S, P, N>),
    )
    .route("/sites/{id}/history", get(sites::history::<S, P, N>))
    .route("/sites/{id}/plan", put(sites::change_plan::<S, P, N>))
    // Scheduling
    .route("/reconcile", post(reconcile::handler::<S, P, N>))
    // Catalog
    .route("/templates", get(templates::handler::<S, P, N>))
    .with_state(ApiState { service, catalog })
}

#[cfg(test)]
mod tests;
