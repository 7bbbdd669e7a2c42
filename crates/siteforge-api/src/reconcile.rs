//! `POST /reconcile`: run one reconciliation tick on demand.

use axum::{Json, extract::State};
use siteforge_core::{notify::OwnerNotifier, provider::Provider, store::SiteStore};
use siteforge_provisioning::TickReport;

use crate::{ApiState, error::ApiError};

pub async fn handler<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
) -> Result<Json<TickReport>, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  Ok(Json(state.service.tick().await?))
}
