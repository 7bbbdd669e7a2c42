//! The `reqwest`-backed [`Provider`] implementation.

use std::{sync::Arc, time::Duration};

use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use siteforge_core::provider::{
  CreateSiteRequest, CreatedSite, Provider, ProviderError, SiteDetails,
  TaskStatus, Template,
};
use tracing::debug;

use crate::{
  credentials::CredentialSource,
  endpoints::ApiVersion,
  wire::{
    self, CreatedSiteWire, SiteDetailsWire, TaskStatusWire, TemplateWire,
  },
};

/// Client settings that do not change between calls.
#[derive(Debug, Clone, Copy)]
pub struct ProviderConfig {
  pub api_version: ApiVersion,
  /// Applied to every request, connection setup included.
  pub timeout:     Duration,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self { api_version: ApiVersion::default(), timeout: Duration::from_secs(30) }
  }
}

/// Talks to the remote provider. Cheap to clone.
#[derive(Clone)]
pub struct ProviderClient {
  http:        reqwest::Client,
  credentials: Arc<dyn CredentialSource>,
  config:      ProviderConfig,
}

impl ProviderClient {
  pub fn new(
    credentials: Arc<dyn CredentialSource>,
    config: ProviderConfig,
  ) -> Result<Self, ProviderError> {
    let http = reqwest::Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| ProviderError::Transport(e.to_string()))?;
    Ok(Self { http, credentials, config })
  }

  pub fn api_version(&self) -> ApiVersion { self.config.api_version }

  // ─── Request plumbing ──────────────────────────────────────────────────────

  fn api_key(&self) -> Result<String, ProviderError> {
    self
      .credentials
      .api_key()
      .filter(|k| !k.trim().is_empty())
      .ok_or(ProviderError::Unauthenticated)
  }

  fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
    let base = self.credentials.api_base_url();
    let invalid = |reason: String| {
      ProviderError::InvalidArgument(format!(
        "invalid provider base URL {base:?}: {reason}"
      ))
    };
    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    url
      .path_segments_mut()
      .map_err(|()| invalid("cannot be a base".into()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn classify(&self, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
      ProviderError::Timeout { timeout_secs: self.config.timeout.as_secs() }
    } else {
      ProviderError::Transport(err.to_string())
    }
  }

  /// Send `request`, check the status, unwrap the envelope and decode.
  /// Returns the decoded value together with the unwrapped payload.
  async fn send<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
  ) -> Result<(T, Value), ProviderError> {
    let resp = request.send().await.map_err(|e| self.classify(e))?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| self.classify(e))?;
    debug!(status = status.as_u16(), bytes = body.len(), "provider response");

    if !status.is_success() {
      let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| wire::error_message(&v));
      return Err(ProviderError::Upstream { status: status.as_u16(), message });
    }

    let body: Value = serde_json::from_str(&body)
      .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
    if wire::is_soft_failure(&body) {
      return Err(ProviderError::Upstream {
        status:  status.as_u16(),
        message: wire::error_message(&body),
      });
    }

    let payload = wire::unwrap_envelope(body);
    let decoded = T::deserialize(&payload)
      .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
    Ok((decoded, payload))
  }

  fn get(&self, segments: &[&str]) -> Result<RequestBuilder, ProviderError> {
    let key = self.api_key()?;
    let url = self.url(segments)?;
    debug!("GET {url}");
    Ok(self.http.get(url).bearer_auth(key))
  }
}

fn require(name: &str, value: &str) -> Result<(), ProviderError> {
  if value.trim().is_empty() {
    return Err(ProviderError::InvalidArgument(format!("{name} is required")));
  }
  Ok(())
}

impl Provider for ProviderClient {
  async fn create_site(
    &self,
    request: &CreateSiteRequest,
  ) -> Result<CreatedSite, ProviderError> {
    require("template_slug", &request.template_slug)?;
    let key = self.api_key()?;
    let url = self.url(&self.config.api_version.create_site())?;
    debug!("POST {url}");

    let (wire, raw): (CreatedSiteWire, _) =
      self.send(self.http.post(url).bearer_auth(key).json(request)).await?;
    Ok(wire.into_created(raw))
  }

  async fn task_status(
    &self,
    task_id: &str,
  ) -> Result<TaskStatus, ProviderError> {
    require("task_id", task_id)?;
    let request = self.get(&self.config.api_version.task_status(task_id))?;
    let (wire, raw): (TaskStatusWire, _) = self.send(request).await?;
    Ok(wire.into_status(raw))
  }

  async fn site_details(
    &self,
    resource_id: &str,
  ) -> Result<SiteDetails, ProviderError> {
    require("resource_id", resource_id)?;
    let request =
      self.get(&self.config.api_version.site_details(resource_id))?;
    let (wire, raw): (SiteDetailsWire, _) = self.send(request).await?;
    Ok(wire.into_details(raw))
  }

  async fn list_templates(&self) -> Result<Vec<Template>, ProviderError> {
    let request = self.get(&self.config.api_version.templates())?;
    let (wire, _): (Vec<TemplateWire>, _) = self.send(request).await?;
    Ok(wire.into_iter().filter_map(TemplateWire::into_template).collect())
  }
}
