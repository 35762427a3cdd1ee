//! ESearch keyword search against a mocked NCBI endpoint
//!
//! These tests verify query construction, identifier parsing and error
//! handling without making real API calls.

use pubmed_harvester::{ClientConfig, HarvestError, PubMedClient, PubMedId, RetryConfig};
use rstest::rstest;
use serde_json::json;
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn esearch_body(ids: &[&str]) -> serde_json::Value {
    json!({
        "header": {"type": "esearch", "version": "0.3"},
        "esearchresult": {
            "count": ids.len().to_string(),
            "retmax": ids.len().to_string(),
            "retstart": "0",
            "idlist": ids,
            "translationset": [],
            "querytranslation": "mocked"
        }
    })
}

/// Helper to create a client pointing at a mock server
fn create_mock_client(mock_server: &MockServer) -> PubMedClient {
    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_retry_config(RetryConfig::no_retry());

    PubMedClient::with_config(config)
}

#[tokio::test]
#[traced_test]
async fn test_search_builds_keyword_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("term", "school+violence[KYWD]"))
        .and(query_param("retmax", "10"))
        .and(query_param("retmode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["300", "100", "200"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let pmids = client
        .search("school violence", 10)
        .await
        .expect("Search should succeed");

    let values: Vec<u32> = pmids.iter().map(PubMedId::as_u32).collect();
    assert_eq!(values, vec![300, 100, 200], "ESearch order is preserved");
}

#[tokio::test]
#[traced_test]
async fn test_search_appends_api_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("api_key", "secret"))
        .and(query_param("email", "someone@example.org"))
        .and(query_param("tool", "pubmed-harvester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["1"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_api_key("secret")
        .with_email("someone@example.org")
        .with_retry_config(RetryConfig::no_retry());
    let client = PubMedClient::with_config(config);

    let pmids = client.search("bullying", 5).await.unwrap();
    assert_eq!(pmids.len(), 1);
}

#[tokio::test]
#[traced_test]
async fn test_search_with_no_matches_returns_empty_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&[])))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let pmids = client.search("zzzxqj", 10).await.unwrap();

    assert!(pmids.is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_search_skips_malformed_identifiers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["42", "abc", "0", "7"])))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let pmids = client.search("bullying", 10).await.unwrap();

    let values: Vec<u32> = pmids.iter().map(PubMedId::as_u32).collect();
    assert_eq!(values, vec![42, 7]);
    assert!(logs_contain("Skipping invalid identifier"));
}

#[tokio::test]
#[traced_test]
async fn test_search_error_field_is_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "esearchresult": {"ERROR": "Invalid query"}
        })))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client.search("bullying", 10).await.unwrap_err();

    match err {
        HarvestError::ApiError { status, message } => {
            assert_eq!(status, 200);
            assert!(message.contains("Invalid query"));
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
}

#[rstest]
#[case(500)]
#[case(503)]
#[case(404)]
#[tokio::test]
async fn test_search_http_failure_is_api_error(#[case] status: u16) {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client.search("bullying", 10).await.unwrap_err();

    assert!(
        matches!(err, HarvestError::ApiError { status: s, .. } if s == status),
        "Unexpected error: {:?}",
        err
    );
}

#[tokio::test]
#[traced_test]
async fn test_search_retries_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["9"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_retry_config(
            RetryConfig::new()
                .with_max_retries(2)
                .with_initial_delay(std::time::Duration::from_millis(10))
                .without_jitter(),
        );
    let client = PubMedClient::with_config(config);

    let pmids = client.search("bullying", 10).await.unwrap();
    assert_eq!(pmids.len(), 1);
}

#[tokio::test]
#[traced_test]
async fn test_search_with_invalid_json_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let result = client.search("bullying", 10).await;

    assert!(result.is_err());
}
