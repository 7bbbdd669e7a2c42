//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use serde_json::{Value, json};
use siteforge_core::{
  notify::TracingNotifier,
  provider::{
    CreateSiteRequest, CreatedSite, Provider, ProviderError, SiteDetails,
    TaskStatus, Template,
  },
  site::SiteAccess,
  status::RawStatus,
};
use siteforge_provider::TemplateCatalog;
use siteforge_provisioning::{ProvisioningConfig, SiteService};
use siteforge_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use crate::api_router;

// ─── Fake provider ────────────────────────────────────────────────────────────

/// Hands out pool sites with increasing ids, unless the template is `broken`.
#[derive(Default)]
struct PoolProvider {
  next_id:        AtomicUsize,
  template_calls: AtomicUsize,
}

impl Provider for PoolProvider {
  async fn create_site(
    &self,
    request: &CreateSiteRequest,
  ) -> Result<CreatedSite, ProviderError> {
    if request.template_slug == "broken" {
      return Err(ProviderError::Upstream {
        status:  422,
        message: Some("template not found".into()),
      });
    }
    let id = (1000 + self.next_id.fetch_add(1, Ordering::SeqCst)).to_string();
    Ok(CreatedSite {
      id: Some(id.clone()),
      access: SiteAccess {
        site_url: Some(format!("https://s-{id}.example")),
        admin_username: Some("admin".into()),
        ..SiteAccess::default()
      },
      status: Some(RawStatus::Code(0)),
      is_pool: Some(true),
      raw: json!({ "id": id }),
      ..CreatedSite::default()
    })
  }

  async fn task_status(&self, _: &str) -> Result<TaskStatus, ProviderError> {
    Err(ProviderError::Transport("not used".into()))
  }

  async fn site_details(&self, _: &str) -> Result<SiteDetails, ProviderError> {
    Err(ProviderError::Transport("not used".into()))
  }

  async fn list_templates(&self) -> Result<Vec<Template>, ProviderError> {
    self.template_calls.fetch_add(1, Ordering::SeqCst);
    Ok(vec![Template { slug: "shop".into(), name: "Shop".into() }])
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

struct TestApp {
  router:   Router,
  provider: Arc<PoolProvider>,
}

async fn app() -> TestApp {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let provider = Arc::new(PoolProvider::default());
  let service = Arc::new(SiteService::new(
    store,
    Arc::clone(&provider),
    Arc::new(TracingNotifier),
    ProvisioningConfig::default(),
  ));
  let catalog =
    Arc::new(TemplateCatalog::new(Arc::clone(&provider), Duration::from_secs(60)));
  TestApp { router: api_router(service, catalog), provider }
}

async fn send(
  router: &Router,
  method: &str,
  uri: &str,
  headers: Vec<(header::HeaderName, &str)>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(k, v);
  }
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn create(router: &Router, order_id: &str) -> Value {
  let resp = send(
    router,
    "POST",
    "/sites",
    vec![],
    Some(json!({
      "template_slug": "shop",
      "owner": { "order_id": order_id, "user_id": "u-1" }
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  json_body(resp).await
}

// ─── Sites ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_returns_201_with_record() {
  let app = app().await;

  let record = create(&app.router, "o-1").await;

  assert_eq!(record["site_id"], "1000");
  assert_eq!(record["status"], "completed");
  assert_eq!(record["access"]["site_url"], "https://s-1000.example");
  assert_eq!(record["owner"]["order_id"], "o-1");
}

#[tokio::test]
async fn provider_rejection_is_bad_gateway_with_site_id() {
  let app = app().await;

  let resp = send(
    &app.router,
    "POST",
    "/sites",
    vec![],
    Some(json!({ "template_slug": "broken" })),
  )
  .await;

  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  let body = json_body(resp).await;
  assert!(body["error"].as_str().unwrap().contains("template not found"));
  let site_id = body["site_id"].as_str().unwrap().to_owned();

  let resp = send(&app.router, "GET", &format!("/sites/{site_id}"), vec![], None).await;
  assert_eq!(json_body(resp).await["status"], "failed");
}

#[tokio::test]
async fn empty_template_is_bad_request() {
  let app = app().await;

  let resp = send(
    &app.router,
    "POST",
    "/sites",
    vec![],
    Some(json!({ "template_slug": "" })),
  )
  .await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_site_is_404() {
  let app = app().await;
  let resp = send(&app.router, "GET", "/sites/nope", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn get_honours_if_none_match() {
  let app = app().await;
  create(&app.router, "o-1").await;

  let resp = send(&app.router, "GET", "/sites/1000", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let etag = resp
    .headers()
    .get(header::ETAG)
    .unwrap()
    .to_str()
    .unwrap()
    .to_owned();

  let resp = send(
    &app.router,
    "GET",
    "/sites/1000",
    vec![(header::IF_NONE_MATCH, etag.as_str())],
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
  assert_eq!(resp.headers().get(header::ETAG).unwrap(), etag.as_str());

  let resp = send(
    &app.router,
    "GET",
    "/sites/1000",
    vec![(header::IF_NONE_MATCH, "\"stale\"")],
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn list_filters_by_owner() {
  let app = app().await;
  create(&app.router, "o-1").await;
  create(&app.router, "o-2").await;

  let resp = send(&app.router, "GET", "/sites?order_id=o-2", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let sites = json_body(resp).await;
  assert_eq!(sites.as_array().unwrap().len(), 1);
  assert_eq!(sites[0]["site_id"], "1001");

  let resp = send(&app.router, "GET", "/sites?user_id=u-1", vec![], None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn delete_then_get_is_404() {
  let app = app().await;
  create(&app.router, "o-1").await;

  let resp = send(&app.router, "DELETE", "/sites/1000", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let resp = send(&app.router, "GET", "/sites/1000", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let resp = send(&app.router, "DELETE", "/sites/1000", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plan_change_shows_in_history() {
  let app = app().await;
  create(&app.router, "o-1").await;

  let resp = send(
    &app.router,
    "PUT",
    "/sites/1000/plan",
    vec![],
    Some(json!({ "plan_id": 12 })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["plan_id"], 12);

  let resp = send(&app.router, "GET", "/sites/1000/history", vec![], None).await;
  let events: Vec<String> = json_body(resp)
    .await
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["event"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(events, ["created", "creation_response", "plan_changed"]);
}

// ─── Reconcile and templates ─────────────────────────────────────────────────

#[tokio::test]
async fn reconcile_returns_report() {
  let app = app().await;

  let resp = send(&app.router, "POST", "/reconcile", vec![], None).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let report = json_body(resp).await;
  assert_eq!(report["skipped"], false);
  assert_eq!(report["polled"], 0);
}

#[tokio::test]
async fn templates_are_cached() {
  let app = app().await;

  for _ in 0..3 {
    let resp = send(&app.router, "GET", "/templates", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await[0]["slug"], "shop");
  }
  assert_eq!(app.provider.template_calls.load(Ordering::SeqCst), 1);
}
