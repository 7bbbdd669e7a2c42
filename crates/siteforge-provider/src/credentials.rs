//! Where the provider API key and base URL come from.

/// Supplies the provider credentials. Read before every call, so a source
/// backed by mutable settings picks up a rotated key without a restart.
pub trait CredentialSource: Send + Sync {
  /// The bearer token, or `None` when no key is configured.
  fn api_key(&self) -> Option<String>;

  /// Root URL of the provider, e.g. `https://app.provider.example`.
  fn api_base_url(&self) -> String;
}

/// Fixed credentials, typically loaded once from configuration.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
  pub api_key:  Option<String>,
  pub base_url: String,
}

impl StaticCredentials {
  pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
    Self { api_key, base_url: base_url.into() }
  }
}

impl CredentialSource for StaticCredentials {
  fn api_key(&self) -> Option<String> {
    self.api_key.clone().filter(|k| !k.trim().is_empty())
  }

  fn api_base_url(&self) -> String { self.base_url.clone() }
}
