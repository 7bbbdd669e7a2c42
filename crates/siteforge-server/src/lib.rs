//! The siteforge server: configuration, Basic auth, the reconciliation
//! scheduler and the HTTP front door.
//!
//! `/api/*` serves [`siteforge_api`] behind Basic auth; `/health` is open.

pub mod auth;
pub mod config;
pub mod scheduler;

pub use config::ServerConfig;

use std::sync::Arc;

use axum::{Json, Router, middleware, routing::get};
use serde_json::{Value, json};
use siteforge_core::{notify::TracingNotifier, provider::ProviderError};
use siteforge_provider::{CredentialSource, ProviderClient, TemplateCatalog};
use siteforge_provisioning::SiteService;
use siteforge_store_sqlite::SqliteStore;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};

/// The service as wired up by the binary.
pub type Service = SiteService<SqliteStore, ProviderClient, TracingNotifier>;

// ─── Application state ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
  pub service: Arc<Service>,
  pub catalog: Arc<TemplateCatalog<ProviderClient>>,
  pub auth:    Arc<AuthConfig>,
}

impl AppState {
  /// Wire the provider client, the service and the catalog around `store`.
  pub fn new(config: &ServerConfig, store: SqliteStore) -> Result<Self, ProviderError> {
    let credentials: Arc<dyn CredentialSource> = Arc::new(config.provider.clone());
    let provider = Arc::new(ProviderClient::new(credentials, config.provider_config())?);

    let service = Arc::new(SiteService::new(
      Arc::new(store),
      Arc::clone(&provider),
      Arc::new(TracingNotifier),
      config.provisioning_config(),
    ));
    let catalog = Arc::new(TemplateCatalog::new(provider, config.catalog_ttl()));
    let auth = Arc::new(AuthConfig {
      username:      config.auth_username.clone(),
      password_hash: config.auth_password_hash.clone(),
    });

    Ok(Self { service, catalog, auth })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: &AppState) -> Router {
  let api = siteforge_api::api_router(
    Arc::clone(&state.service),
    Arc::clone(&state.catalog),
  )
  .layer(middleware::from_fn_with_state(Arc::clone(&state.auth), require_auth));

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests;
