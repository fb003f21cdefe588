//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: YAML config → client → paginated reads and
//! batch writes against one mock API

use futures::StreamExt;
use orgpager::http::RateLimitStore;
use orgpager::{ApiClient, CallContext, ClientConfig, Error, ItemOutcome, RequestDescriptor};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn yaml_config(uri: &str) -> String {
    format!(
        r"
base_url: {uri}
org_id: acme
timeout_secs: 5
retry:
  max_attempts: 3
  base_delay_ms: 10
  max_backoff_ms: 100
  jitter: none
rate_limit: null
batch:
  chunk_size: 2
  inter_chunk_delay_ms: 0
"
    )
}

fn client_from_yaml(uri: &str) -> ApiClient {
    let env: HashMap<&str, &str> = HashMap::from([("ORGPAGER_TOKEN", "env-token")]);
    let config = ClientConfig::from_yaml_str(&yaml_config(uri))
        .unwrap()
        .with_overrides(|name| env.get(name).map(ToString::to_string));
    ApiClient::new(config).unwrap()
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_config_file_and_env_drive_the_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/profile"))
        .and(header("Authorization", "Bearer env-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Acme"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("orgpager.yaml");
    std::fs::write(&file, yaml_config(&mock_server.uri())).unwrap();

    let config = ClientConfig::from_file(&file)
        .unwrap()
        .with_overrides(|name| (name == "ORGPAGER_TOKEN").then(|| "env-token".to_string()));
    assert!(config.rate_limit.is_none());
    assert_eq!(config.retry.max_attempts, 3);

    let client = ApiClient::new(config).unwrap();
    let response = client
        .execute(&RequestDescriptor::get("/orgs/{org_id}/profile").build())
        .await
        .unwrap();
    assert_eq!(response.body["name"], "Acme");
}

#[test]
fn test_config_without_token_is_rejected() {
    let config = ClientConfig::from_yaml_str(&yaml_config("https://api.example.com")).unwrap();
    assert!(matches!(
        ApiClient::new(config),
        Err(Error::MissingConfigField { ref field }) if field == "token"
    ));
}

// ============================================================================
// Read then write
// ============================================================================

#[tokio::test]
async fn test_list_then_batch_update() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/devices"))
        .and(header("Continuation-Token", "page-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": "d3", "fw": "1.0"}]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/devices"))
        .and(query_param("fw", "1.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Continuation-Token", "page-2")
                .set_body_json(json!({"data": [
                    {"id": "d1", "fw": "1.0"},
                    {"id": "d2", "fw": "1.0"}
                ]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Second chunk carries d3; its per-item result rejects it
    Mock::given(method("PATCH"))
        .and(path("/orgs/acme/devices/batch"))
        .and(body_partial_json(json!({"items": [{"id": "d3"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"error": {"code": "locked", "message": "device is locked"}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/orgs/acme/devices/batch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_from_yaml(&mock_server.uri());

    let list = RequestDescriptor::get("/orgs/{org_id}/devices")
        .query("fw", "1.0")
        .build();
    let devices: Vec<_> = client
        .stream(&list)
        .map(|device| {
            let device = device.unwrap();
            json!({"id": device["id"], "fw": "2.0"})
        })
        .collect()
        .await;
    assert_eq!(devices.len(), 3);

    let update = RequestDescriptor::patch("/orgs/{org_id}/devices/batch").build();
    let report = client.batch_write(&update, devices).await.unwrap();

    assert_eq!(report.chunk_count(), 2);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.rejected(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.index, 2);
    assert!(matches!(
        &failure.outcome,
        ItemOutcome::Rejected { code: Some(code), .. } if code == "locked"
    ));
}

#[tokio::test]
async fn test_stream_stops_when_cancelled_between_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/packets"))
        .and(header("Continuation-Token", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [3]})))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/packets"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Continuation-Token", "next")
                .set_body_json(json!({"data": [1, 2]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_from_yaml(&mock_server.uri());
    let token = CancellationToken::new();
    let desc = RequestDescriptor::get("/orgs/{org_id}/packets").build();
    let mut stream = client.stream_with(&desc, CallContext::new().with_cancellation(token.clone()));

    assert_eq!(stream.next().await.unwrap().unwrap(), json!(1));
    assert_eq!(stream.next().await.unwrap().unwrap(), json!(2));
    token.cancel();
    assert!(matches!(stream.next().await, Some(Err(Error::Cancelled))));
    assert!(stream.next().await.is_none());
}

// ============================================================================
// Shared rate-limit state
// ============================================================================

#[tokio::test]
async fn test_clients_sharing_a_store_share_throttling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orgs/acme/metrics"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Limit", "10")
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("X-RateLimit-Reset", "1")
                .set_body_json(json!({"uplinks": 1})),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = Arc::new(RateLimitStore::default());
    let config = ClientConfig::from_yaml_str(&yaml_config(&mock_server.uri()))
        .unwrap()
        .with_overrides(|name| (name == "ORGPAGER_TOKEN").then(|| "t".to_string()));
    let first = ApiClient::with_store(config.clone(), Arc::clone(&store)).unwrap();
    let second = ApiClient::with_store(config, Arc::clone(&store)).unwrap();

    let desc = RequestDescriptor::get("/orgs/{org_id}/metrics").build();
    first.execute(&desc).await.unwrap();
    assert_eq!(store.len().await, 1);

    let started = Instant::now();
    second.execute(&desc).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(800));
}
