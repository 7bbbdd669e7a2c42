#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use serde_json::json;
use siteforge_core::{
  provider::{CreateSiteRequest, Provider, ProviderError},
  status::{RawStatus, TaskState, map_status},
};
use siteforge_provider::{
  ApiVersion, ProviderClient, ProviderConfig, StaticCredentials,
};
use wiremock::{
  Mock, MockServer, ResponseTemplate,
  matchers::{body_json, header, method, path},
};

// ── Helpers ─────────────────────────────────────────────────────────

fn client_with(
  server: &MockServer,
  api_key: Option<&str>,
  api_version: ApiVersion,
) -> ProviderClient {
  let credentials =
    StaticCredentials::new(server.uri(), api_key.map(str::to_owned));
  ProviderClient::new(Arc::new(credentials), ProviderConfig {
    api_version,
    timeout: Duration::from_secs(2),
  })
  .unwrap()
}

fn client(server: &MockServer) -> ProviderClient {
  client_with(server, Some("secret"), ApiVersion::V2)
}

fn request(slug: &str) -> CreateSiteRequest {
  CreateSiteRequest {
    template_slug: slug.into(),
    plan_id:       Some(3),
    is_reserved:   false,
    expiry_hours:  Some(8),
    is_shared:     None,
  }
}

// ── Creation ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_posts_body_with_bearer_and_decodes_pool_site() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/v2/sites/template"))
    .and(header("authorization", "Bearer secret"))
    .and(body_json(json!({
      "template_slug": "shop",
      "plan_id": 3,
      "is_reserved": false,
      "expiry_hours": 8
    })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "status": true,
      "data": {
        "id": 981,
        "wp_url": "https://shop-981.example",
        "wp_username": "admin",
        "wp_password": "pw",
        "s_hash": "abc",
        "status": 0,
        "is_pool": 1
      }
    })))
    .expect(1)
    .mount(&server)
    .await;

  let created = client(&server).create_site(&request("shop")).await.unwrap();

  assert_eq!(created.id.as_deref(), Some("981"));
  assert_eq!(created.is_pool, Some(true));
  assert_eq!(created.status, Some(RawStatus::Code(0)));
  assert_eq!(
    created.access.site_url.as_deref(),
    Some("https://shop-981.example")
  );
  assert_eq!(created.access.session_hash.as_deref(), Some("abc"));
  assert_eq!(created.raw["id"], 981);
}

#[tokio::test]
async fn create_accepts_body_without_envelope() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/v2/sites/template"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "77",
      "task_id": 5501,
      "status": "progress",
      "is_pool": "false"
    })))
    .mount(&server)
    .await;

  let created = client(&server).create_site(&request("blog")).await.unwrap();

  assert_eq!(created.id.as_deref(), Some("77"));
  assert_eq!(created.task_id.as_deref(), Some("5501"));
  assert_eq!(created.is_pool, Some(false));
  assert!(created.access.is_empty());
}

#[tokio::test]
async fn legacy_version_uses_legacy_paths() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/v1/sites"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 1}})),
    )
    .expect(1)
    .mount(&server)
    .await;

  let client = client_with(&server, Some("secret"), ApiVersion::V1);
  client.create_site(&request("shop")).await.unwrap();
}

// ── Validation and credentials ──────────────────────────────────────

#[tokio::test]
async fn empty_identifiers_never_reach_the_network() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  let client = client(&server);
  assert!(matches!(
    client.create_site(&request("  ")).await,
    Err(ProviderError::InvalidArgument(_))
  ));
  assert!(matches!(
    client.task_status("").await,
    Err(ProviderError::InvalidArgument(_))
  ));
  assert!(matches!(
    client.site_details("").await,
    Err(ProviderError::InvalidArgument(_))
  ));
}

#[tokio::test]
async fn missing_api_key_is_unauthenticated() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  for key in [None, Some("   ")] {
    let client = client_with(&server, key, ApiVersion::V2);
    assert_eq!(
      client.task_status("t1").await.unwrap_err(),
      ProviderError::Unauthenticated
    );
  }
}

// ── Task status and details ─────────────────────────────────────────

#[tokio::test]
async fn task_status_decodes_string_status() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/v2/tasks/t-9/status"))
    .and(header("authorization", "Bearer secret"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": {"status": "Completed", "resource_id": 4242}
    })))
    .mount(&server)
    .await;

  let status = client(&server).task_status("t-9").await.unwrap();

  assert_eq!(map_status(status.status.as_ref().unwrap()), TaskState::Completed);
  assert_eq!(status.resource_id.as_deref(), Some("4242"));
  assert!(status.message.is_none());
}

#[tokio::test]
async fn site_details_reads_nested_credentials() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/v2/sites/4242/details"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": {
        "url": "https://s-4242.example",
        "site_meta": {"wp_username": "admin", "wp_password": "pw"},
        "s_hash": "h",
        "wp_admin_url": "https://s-4242.example/wp-admin"
      }
    })))
    .mount(&server)
    .await;

  let details = client(&server).site_details("4242").await.unwrap();

  assert!(details.access.is_usable());
  assert_eq!(details.access.admin_password.as_deref(), Some("pw"));
  assert_eq!(
    details.access.admin_url.as_deref(),
    Some("https://s-4242.example/wp-admin")
  );
}

#[tokio::test]
async fn templates_are_listed() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/v2/templates"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "data": [
        {"slug": "shop", "name": "Shop"},
        {"slug": "blog"},
        {"name": "no slug"}
      ]
    })))
    .mount(&server)
    .await;

  let templates = client(&server).list_templates().await.unwrap();
  let slugs: Vec<_> = templates.iter().map(|t| t.slug.as_str()).collect();
  assert_eq!(slugs, ["shop", "blog"]);
  assert_eq!(templates[1].name, "blog");
}

// ── Failure classification ──────────────────────────────────────────

#[tokio::test]
async fn non_2xx_is_upstream_with_message() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(
      ResponseTemplate::new(422)
        .set_body_json(json!({"message": "template not found"})),
    )
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(503).set_body_string("<html>"))
    .mount(&server)
    .await;

  let client = client(&server);
  assert_eq!(
    client.create_site(&request("nope")).await.unwrap_err(),
    ProviderError::Upstream {
      status:  422,
      message: Some("template not found".into()),
    }
  );
  let err = client.task_status("t1").await.unwrap_err();
  assert_eq!(err, ProviderError::Upstream { status: 503, message: None });
  assert!(err.is_transient());
}

#[tokio::test]
async fn soft_failure_body_is_upstream() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "status": false,
      "message": "Task not found"
    })))
    .mount(&server)
    .await;

  let err = client(&server).task_status("t1").await.unwrap_err();
  assert_eq!(err, ProviderError::Upstream {
    status:  200,
    message: Some("Task not found".into()),
  });
}

#[tokio::test]
async fn undecodable_2xx_is_malformed() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
    .mount(&server)
    .await;

  assert!(matches!(
    client(&server).site_details("1").await,
    Err(ProviderError::MalformedResponse(_))
  ));
}

#[tokio::test]
async fn slow_provider_times_out() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(json!({"data": {"status": 1}}))
        .set_delay(Duration::from_secs(5)),
    )
    .mount(&server)
    .await;

  assert_eq!(
    client(&server).task_status("t1").await.unwrap_err(),
    ProviderError::Timeout { timeout_secs: 2 }
  );
}

#[tokio::test]
async fn unreachable_provider_is_transport() {
  let credentials =
    StaticCredentials::new("http://127.0.0.1:1", Some("secret".into()));
  let client =
    ProviderClient::new(Arc::new(credentials), ProviderConfig::default())
      .unwrap();

  let err = client.task_status("t1").await.unwrap_err();
  assert!(matches!(err, ProviderError::Transport(_)), "{err:?}");
}
