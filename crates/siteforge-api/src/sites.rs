//! Handlers for `/sites` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/sites` | Body: [`NewSite`]; returns 201 + record |
//! | `GET`    | `/sites` | Optional `?order_id`, `user_id`, `source` (ANDed) |
//! | `GET`    | `/sites/:id` | `ETag`; `If-None-Match` → 304 |
//! | `DELETE` | `/sites/:id` | Local record only; 204 |
//! | `GET`    | `/sites/:id/history` | Oldest first |
//! | `PUT`    | `/sites/:id/plan` | Body: `{"plan_id": 7}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use siteforge_core::{
  history::HistoryEntry,
  notify::OwnerNotifier,
  provider::Provider,
  site::{NewSite, SiteRecord},
  store::{OwnerQuery, SiteStore},
};

use crate::{
  ApiState,
  error::ApiError,
  etag::{if_none_match, site_etag},
};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /sites`
pub async fn create<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
  Json(body): Json<NewSite>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  let record = state.service.create_site(body).await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub order_id: Option<String>,
  pub user_id:  Option<String>,
  pub source:   Option<String>,
}

impl From<ListParams> for OwnerQuery {
  fn from(p: ListParams) -> Self {
    OwnerQuery { order_id: p.order_id, user_id: p.user_id, source: p.source }
  }
}

/// `GET /sites[?order_id=...][&user_id=...][&source=...]`
pub async fn list<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SiteRecord>>, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  let query = OwnerQuery::from(params);
  Ok(Json(state.service.list_sites_by_owner(&query).await?))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /sites/:id`
pub async fn get_one<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  let record = state.service.get_site(&id).await?;
  let etag = site_etag(&record);

  let fresh = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| if_none_match(v, &etag));
  if fresh {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(([(header::ETAG, etag)], Json(record)).into_response())
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /sites/:id`: removes the record and its history. The provider
/// is not contacted.
pub async fn delete_one<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  state.service.delete_site(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /sites/:id/history`
pub async fn history<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  Ok(Json(state.service.site_history(&id).await?))
}

// ─── Plan ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlanBody {
  pub plan_id: Option<u64>,
}

/// `PUT /sites/:id/plan`: body `{"plan_id": 7}`; `null` clears the plan.
pub async fn change_plan<S, P, N>(
  State(state): State<ApiState<S, P, N>>,
  Path(id): Path<String>,
  Json(body): Json<PlanBody>,
) -> Result<Json<SiteRecord>, ApiError>
where
  S: SiteStore + 'static,
  P: Provider + 'static,
  N: OwnerNotifier + 'static,
{
  Ok(Json(state.service.record_plan_change(&id, body.plan_id).await?))
}
