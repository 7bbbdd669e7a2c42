//! `GET /templates`: the provider's template catalog, served from cache.

use axum::{Json, extract::State};
use siteforge_core::{
  notify::OwnerNotifier,
  provider::{Provider, Template},
  store::SiteStore,
};

use crate::{ApiState, error::ApiError};

pub async fn handler<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
) -> Result<Json<Vec<Template>>, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  Ok(Json(state.catalog.templates().await?))
}
