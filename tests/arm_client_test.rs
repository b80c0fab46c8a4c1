//! ARM client behaviour against a mocked Resource Manager.

use graphprobe_lib::core::config::AzureConfig;
use graphprobe_lib::core::ProbeError;
use graphprobe_lib::graph::{ArmClient, QueryRequest, ResourceGraph};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn azure(server: &MockServer) -> AzureConfig {
    AzureConfig {
        endpoint: server.uri(),
        access_token: Some("static-token".to_string()),
        ..AzureConfig::default()
    }
}

fn request(skip: usize) -> QueryRequest {
    QueryRequest {
        query: "Resources | project id".to_string(),
        subscriptions: vec!["sub-a".to_string()],
        skip,
        top: 1000,
    }
}

#[tokio::test]
async fn test_subscriptions_follow_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(query_param("api-version", "2022-12-01"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer static-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"subscriptionId": "SUB-C"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(query_param("api-version", "2022-12-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"subscriptionId": "sub-a"}, {"subscriptionId": "sub-b"}],
            "nextLink": format!("{}/subscriptions?api-version=2022-12-01&page=2", server.uri())
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = ArmClient::new(&azure(&server)).unwrap();

    let all = client.list_subscriptions(&[]).await.unwrap();
    assert_eq!(all, vec!["sub-a", "sub-b", "SUB-C"]);

    let allowed = client
        .list_subscriptions(&["sub-c".to_string(), "sub-a".to_string()])
        .await
        .unwrap();
    assert_eq!(allowed, vec!["sub-a", "SUB-C"]);
}

#[tokio::test]
async fn test_query_sends_paging_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/providers/Microsoft.ResourceGraph/resources"))
        .and(query_param("api-version", "2021-03-01"))
        .and(body_json(json!({
            "subscriptions": ["sub-a"],
            "query": "Resources | project id",
            "options": {"$top": 1000, "$skip": 1000, "resultFormat": "objectArray"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalRecords": 1002,
            "count": 2,
            "resultTruncated": "false",
            "data": [{"id": "/subscriptions/sub-a/vm1"}, {"id": "/subscriptions/sub-a/vm2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ArmClient::new(&azure(&server)).unwrap();
    let page = client.query(&request(1000)).await.unwrap();

    assert_eq!(page.total_records, Some(1002));
    let rows = page.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["id"], "/subscriptions/sub-a/vm2");
}

#[tokio::test]
async fn test_http_error_surfaces_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/providers/Microsoft.ResourceGraph/resources"))
        .respond_with(ResponseTemplate::new(429).set_body_string("RateLimiting"))
        .mount(&server)
        .await;

    let client = ArmClient::new(&azure(&server)).unwrap();
    let err = client.query(&request(0)).await.unwrap_err();

    match err {
        ProbeError::Remote { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "RateLimiting");
        },
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_client_secret_token_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "issued-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(header("authorization", "Bearer issued-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"subscriptionId": "sub-a"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let config = AzureConfig {
        endpoint: server.uri(),
        authority: server.uri(),
        tenant_id: Some("tenant-1".to_string()),
        client_id: Some("app".to_string()),
        client_secret: Some("secret".to_string()),
        ..AzureConfig::default()
    };
    let client = ArmClient::new(&config).unwrap();

    client.authorize().await.unwrap();
    assert_eq!(client.list_subscriptions(&[]).await.unwrap(), vec!["sub-a"]);
    assert_eq!(client.list_subscriptions(&[]).await.unwrap(), vec!["sub-a"]);
}

#[tokio::test]
async fn test_rejected_credential_fails_authorize() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let config = AzureConfig {
        endpoint: server.uri(),
        authority: server.uri(),
        tenant_id: Some("tenant-1".to_string()),
        client_id: Some("app".to_string()),
        client_secret: Some("wrong".to_string()),
        ..AzureConfig::default()
    };
    let client = ArmClient::new(&config).unwrap();

    let err = client.authorize().await.unwrap_err();
    assert!(matches!(err, ProbeError::ClientConstruction(_)));
    assert_eq!(err.status_code(), 400);
}
