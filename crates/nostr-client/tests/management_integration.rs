//! Integration tests for the management RPC client
//!
//! These tests use wiremock to stand in for a relay's management endpoint.

use nostr_client::management::{
    ManagementClient, ManagementClientConfig, ManagementError, ManagementRequest,
    MANAGEMENT_CONTENT_TYPE,
};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ManagementClient {
    let config = ManagementClientConfig::new(format!("{}/management", server.uri()));
    ManagementClient::new(config).unwrap()
}

// =============================================================================
// hide_content
// =============================================================================

#[tokio::test]
async fn test_hide_content_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/management"))
        .and(header("Content-Type", MANAGEMENT_CONTENT_TYPE))
        .and(body_json(serde_json::json!({
            "method": "hidecontent",
            "params": ["target-1", "auto: csam"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let hidden = client.hide_content("target-1", "auto: csam").await.unwrap();
    assert!(hidden);
}

#[tokio::test]
async fn test_hide_content_false_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": false})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(!client.hide_content("target-1", "r").await.unwrap());
}

#[tokio::test]
async fn test_hide_content_object_result_counts_as_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"result": {"hidden": "target-1"}})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.hide_content("target-1", "r").await.unwrap());
}

#[tokio::test]
async fn test_hide_content_custom_method_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer admin"))
        .and(body_json(serde_json::json!({"method": "banevent", "params": ["e1", "why"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ManagementClientConfig::new(mock_server.uri()).with_header("Authorization", "Bearer admin");
    let client = ManagementClient::new(config).unwrap().with_hide_method("banevent");

    assert!(client.hide_content("e1", "why").await.unwrap());
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test]
async fn test_rpc_error_in_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "unknown event"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let error = client.hide_content("missing", "r").await.unwrap_err();
    assert_eq!(error.status(), 200);
    assert_eq!(error.error(), "RpcError");
    assert_eq!(error.message(), "unknown event");
}

#[tokio::test]
async fn test_http_error_with_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(serde_json::json!({"error": "not an admin"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let error = client.hide_content("e1", "r").await.unwrap_err();
    assert_eq!(error.status(), 401);
    assert_eq!(error.message(), "not an admin");
    assert!(!error.is_network_error());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let error = client.hide_content("e1", "r").await.unwrap_err();
    assert_eq!(error.status(), 503);
    assert!(error.is_network_error());
    assert!(error.message().contains("overloaded"));
}

#[tokio::test]
async fn test_invalid_json_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let error = client.hide_content("e1", "r").await.unwrap_err();
    assert_eq!(error.error(), "ParseError");
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"result": true}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = ManagementClientConfig::new(mock_server.uri()).with_timeout(Duration::from_millis(200));
    let client = ManagementClient::new(config).unwrap();

    let result = client.hide_content("e1", "r").await;
    let error: ManagementError = result.unwrap_err();
    assert_eq!(error.status(), 0);
    assert_eq!(error.error(), "NetworkError");
}

#[tokio::test]
async fn test_generic_call_decodes_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({"method": "supportedmethods", "params": []})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"result": ["hidecontent", "banpubkey"]})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let methods: Vec<String> = client.call(ManagementRequest::new("supportedmethods")).await.unwrap();
    assert_eq!(methods, vec!["hidecontent".to_string(), "banpubkey".to_string()]);
}
