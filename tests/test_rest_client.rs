use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloud_logging_mcp::api::{ApiErrorCode, CloudLoggingApi, EntriesQuery};
use cloud_logging_mcp::config::GcpConfig;
use cloud_logging_mcp::model::{ListProjectsRequest, OrderBy, Severity, SortDirection};
use cloud_logging_mcp::rest::GoogleCloudLoggingClient;

fn client_for(server: &MockServer) -> GoogleCloudLoggingClient {
    GoogleCloudLoggingClient::new(GcpConfig {
        project_id: Some("demo".to_string()),
        access_token: Some("test-token".to_string()),
        logging_endpoint: server.uri(),
        resource_manager_endpoint: server.uri(),
        ..GcpConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn entries_posts_list_request_and_parses_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/entries:list"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "resourceNames": ["projects/demo"],
            "filter": "severity=\"ERROR\"",
            "orderBy": "timestamp desc",
            "pageSize": 100,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{
                "insertId": "abc",
                "timestamp": "2024-01-01T00:00:00Z",
                "severity": "ERROR",
                "textPayload": "boom",
                "labels": { "service": "api" }
            }],
            "nextPageToken": "tok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .entries(EntriesQuery {
            project_id: "demo".to_string(),
            filter: r#"severity="ERROR""#.to_string(),
            ..EntriesQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(page.entries.len(), 1);
    let entry = &page.entries[0];
    assert_eq!(entry.insert_id.as_str(), "abc");
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.metadata["labels"], json!({ "service": "api" }));
    assert_eq!(page.next_page_token.as_deref(), Some("tok"));
}

#[tokio::test]
async fn entries_honours_resource_names_and_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/entries:list"))
        .and(body_partial_json(json!({
            "resourceNames": ["projects/demo/logs/stdout"],
            "orderBy": "timestamp asc",
            "pageSize": 3,
            "pageToken": "p2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .entries(EntriesQuery {
            project_id: "demo".to_string(),
            filter: String::new(),
            resource_names: Some(vec!["projects/demo/logs/stdout".to_string()]),
            page_size: Some(3),
            page_token: Some("p2".to_string()),
            order_by: Some(OrderBy { timestamp: SortDirection::Asc }),
        })
        .await
        .unwrap();
    assert!(page.entries.is_empty());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn error_body_status_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/entries:list"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Permission denied on resource", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .entries(EntriesQuery {
            project_id: "demo".to_string(),
            ..EntriesQuery::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, Some(ApiErrorCode::PermissionDenied));
    assert_eq!(err.message, "Permission denied on resource");
}

#[tokio::test]
async fn plain_error_body_falls_back_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/projects:search"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_projects(ListProjectsRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, Some(ApiErrorCode::NotFound));
}

#[tokio::test]
async fn list_projects_sends_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/projects:search"))
        .and(query_param("query", "state:ACTIVE"))
        .and(query_param("pageSize", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "projects": [
                { "projectId": "p1", "name": "projects/1", "displayName": "One", "state": "ACTIVE" },
                { "projectId": "p2", "name": "projects/2", "state": "DELETE_REQUESTED" }
            ],
            "nextPageToken": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .list_projects(ListProjectsRequest {
            filter: Some("state:ACTIVE".to_string()),
            page_size: Some(2),
            page_token: None,
        })
        .await
        .unwrap();
    assert_eq!(page.projects.len(), 2);
    assert_eq!(page.projects[0].display_name.as_deref(), Some("One"));
    assert!(page.projects[1].display_name.is_none());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn unreachable_endpoint_is_unavailable() {
    let client = GoogleCloudLoggingClient::new(GcpConfig {
        logging_endpoint: "http://127.0.0.1:1".to_string(),
        request_timeout_ms: 2_000,
        ..GcpConfig::default()
    })
    .unwrap();
    let err = client
        .entries(EntriesQuery {
            project_id: "demo".to_string(),
            ..EntriesQuery::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, Some(ApiErrorCode::Unavailable));
    let _: Value = serde_json::to_value(&err).unwrap();
}
