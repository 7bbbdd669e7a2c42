//! Runtime configuration, deserialised from `config.toml` layered with
//! `SITEFORGE_*` environment variables.
//!
//! ```toml
//! host               = "127.0.0.1"
//! port               = 8080
//! store_path         = "~/.local/share/siteforge/sites.db"
//! auth_username      = "admin"
//! auth_password_hash = "$argon2id$v=19$..."
//!
//! [provider]
//! base_url    = "https://app.provider.example"
//! api_key     = "..."
//! api_version = "v2"
//!
//! [reconciler]
//! interval_secs = 60
//! ```

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use siteforge_provider::{ApiVersion, CredentialSource, ProviderConfig};
use siteforge_provisioning::ProvisioningConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  pub provider:           ProviderSection,
  #[serde(default)]
  pub reconciler:         ReconcilerSection,
  #[serde(default)]
  pub catalog:            CatalogSection,
}

// ─── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSection {
  pub base_url:     String,
  #[serde(default)]
  pub api_key:      Option<String>,
  #[serde(default)]
  pub api_version:  ApiVersion,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReconcilerSection {
  pub interval_secs:        u64,
  pub max_concurrent_polls: usize,
  pub lease_ttl_secs:       u64,
  pub stale_creating_secs:  u64,
}

impl Default for ReconcilerSection {
  fn default() -> Self {
    Self {
      interval_secs:        60,
      max_concurrent_polls: 4,
      lease_ttl_secs:       300,
      stale_creating_secs:  1800,
    }
  }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogSection {
  pub ttl_secs: u64,
}

impl Default for CatalogSection {
  fn default() -> Self { Self { ttl_secs: 900 } }
}

fn default_timeout_secs() -> u64 { 30 }

// ─── Derived settings ─────────────────────────────────────────────────────────

impl ServerConfig {
  pub fn provider_config(&self) -> ProviderConfig {
    ProviderConfig {
      api_version: self.provider.api_version,
      timeout:     Duration::from_secs(self.provider.timeout_secs),
    }
  }

  pub fn provisioning_config(&self) -> ProvisioningConfig {
    ProvisioningConfig {
      call_timeout: Duration::from_secs(self.provider.timeout_secs),
      max_concurrent_polls: self.reconciler.max_concurrent_polls,
      lease_ttl: Duration::from_secs(self.reconciler.lease_ttl_secs),
      stale_after: Duration::from_secs(self.reconciler.stale_creating_secs),
      ..ProvisioningConfig::default()
    }
  }

  pub fn reconcile_interval(&self) -> Duration {
    Duration::from_secs(self.reconciler.interval_secs.max(1))
  }

  pub fn catalog_ttl(&self) -> Duration {
    Duration::from_secs(self.catalog.ttl_secs)
  }
}

/// The provider section doubles as the client's credential source.
impl CredentialSource for ProviderSection {
  fn api_key(&self) -> Option<String> {
    self.api_key.clone().filter(|k| !k.trim().is_empty())
  }

  fn api_base_url(&self) -> String { self.base_url.clone() }
}
