//! Cloud Logging / Resource Manager 的 REST 适配层。
//! 只做请求拼装与错误分类，不处理认证、重试与退避。

use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiError, ApiErrorCode, CloudLoggingApi, EntriesPage, EntriesQuery};
use crate::config::GcpConfig;
use crate::error::{LoggingMcpError, Result};
use crate::model::{ListProjectsRequest, LogEntry, ProjectPage, SortDirection};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesBody<'a> {
    resource_names: Vec<String>,
    filter: &'a str,
    order_by: String,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesResponse {
    #[serde(default)]
    entries: Vec<LogEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Clone)]
pub struct GoogleCloudLoggingClient {
    http: Client,
    config: GcpConfig,
}

impl GoogleCloudLoggingClient {
    pub fn new(config: GcpConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("cloud-logging-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoggingMcpError::Config(format!("http client init failed: {e}")))?;
        Ok(Self { http, config })
    }

    async fn fetch_entries(&self, query: EntriesQuery) -> std::result::Result<EntriesPage, ApiError> {
        let resource_names = match &query.resource_names {
            Some(names) if !names.is_empty() => names.clone(),
            _ => vec![format!("projects/{}", query.project_id)],
        };
        let direction = query.order_by.map(|o| o.timestamp).unwrap_or(SortDirection::Desc);
        let body = ListEntriesBody {
            resource_names,
            filter: &query.filter,
            order_by: format!("timestamp {}", direction.as_str()),
            page_size: query.page_size.unwrap_or(self.config.default_page_size),
            page_token: query.page_token.as_deref().filter(|t| !t.is_empty()),
        };

        let url = format!("{}/v2/entries:list", self.config.logging_endpoint.trim_end_matches('/'));
        debug!(%url, filter = %query.filter, page_size = body.page_size, "listing log entries");

        let resp = self.authorize(self.http.post(&url)).json(&body).send().await.map_err(transport_error)?;
        let page: ListEntriesResponse = decode(resp).await?;
        Ok(EntriesPage {
            entries: page.entries,
            next_page_token: page.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn search_projects(&self, request: ListProjectsRequest) -> std::result::Result<ProjectPage, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = request.filter.filter(|f| !f.is_empty()) {
            params.push(("query", filter));
        }
        if let Some(size) = request.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(token) = request.page_token.filter(|t| !t.is_empty()) {
            params.push(("pageToken", token));
        }

        let url = format!(
            "{}/v3/projects:search",
            self.config.resource_manager_endpoint.trim_end_matches('/')
        );
        debug!(%url, "searching projects");

        let resp = self.authorize(self.http.get(&url)).query(&params).send().await.map_err(transport_error)?;
        let mut page: ProjectPage = decode(resp).await?;
        page.next_page_token = page.next_page_token.filter(|t| !t.is_empty());
        Ok(page)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.access_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl CloudLoggingApi for GoogleCloudLoggingClient {
    fn entries(&self, query: EntriesQuery) -> BoxFuture<'_, std::result::Result<EntriesPage, ApiError>> {
        self.fetch_entries(query).boxed()
    }

    fn list_projects(&self, request: ListProjectsRequest) -> BoxFuture<'_, std::result::Result<ProjectPage, ApiError>> {
        self.search_projects(request).boxed()
    }

    fn default_project_id(&self) -> BoxFuture<'_, Option<String>> {
        future::ready(self.config.project_id.clone().filter(|p| !p.is_empty())).boxed()
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> std::result::Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let err = error_from_body(status.as_u16(), &body);
        warn!(status = status.as_u16(), code = ?err.code, message = %err.message, "cloud api request failed");
        return Err(err);
    }
    resp.json::<T>().await.map_err(|e| {
        ApiError::new(ApiErrorCode::Internal, format!("failed to decode response: {e}"))
    })
}

fn error_from_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed
                .error
                .status
                .as_deref()
                .and_then(ApiErrorCode::from_status_name)
                .unwrap_or_else(|| code_from_number(parsed.error.code, status));
            let message = if parsed.error.message.is_empty() {
                format!("HTTP {status}")
            } else {
                parsed.error.message
            };
            ApiError::new(code, message)
        }
        Err(_) => ApiError::new(
            ApiErrorCode::from_http_status(status),
            format!("HTTP {status}: {}", body.trim()),
        ),
    }
}

// 错误体中的数字码可能是 gRPC 状态码（小于 100），也可能是 HTTP 状态码
fn code_from_number(code: Option<i64>, http_status: u16) -> ApiErrorCode {
    match code {
        Some(c) if (0..100).contains(&c) => ApiErrorCode::from_grpc(c),
        Some(c) => u16::try_from(c)
            .map(ApiErrorCode::from_http_status)
            .unwrap_or(ApiErrorCode::Internal),
        None => ApiErrorCode::from_http_status(http_status),
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    warn!(error = %e, "cloud api transport failure");
    ApiError::new(ApiErrorCode::Unavailable, e.to_string())
}
