//! 对外暴露的三个工具：queryLogs、getLogDetail、listProjects。
//! 工具层不向传输层抛错，所有失败都渲染为带 `isError` 标记的文本。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::{ApiError, CloudLoggingApi, EntriesQuery};
use crate::cache::LogCache;
use crate::error::{LoggingMcpError, Result};
use crate::model::{
    GetLogDetailRequest, ListProjectsRequest, LogEntry, LogId, QueryLogsRequest, QueryLogsResponse,
};
use crate::summary::{to_json_safe, Summarizer};
use crate::time_range::build_query_logs_filter;

pub const QUERY_LOGS: &str = "queryLogs";
pub const GET_LOG_DETAIL: &str = "getLogDetail";
pub const LIST_PROJECTS: &str = "listProjects";

pub const NO_PROJECT_MESSAGE: &str = "Error: No project ID provided and unable to detect default project. \
Please specify a project ID or ensure you're authenticated with gcloud.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    pub fn first_text(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

pub struct LoggingTools {
    api: Arc<dyn CloudLoggingApi>,
    cache: Arc<LogCache>,
    summarizer: Summarizer,
    default_page_size: Option<u32>,
}

impl LoggingTools {
    pub fn new(api: Arc<dyn CloudLoggingApi>, cache: Arc<LogCache>, summarizer: Summarizer) -> Self {
        Self {
            api,
            cache,
            summarizer,
            default_page_size: None,
        }
    }

    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = Some(page_size);
        self
    }

    /// 按名称分发工具调用。未知工具或参数无法解析时返回 `InvalidRequest`。
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        match name {
            QUERY_LOGS => Ok(self.query_logs(parse_args(name, arguments)?).await),
            GET_LOG_DETAIL => Ok(self.get_log_detail(parse_args(name, arguments)?).await),
            LIST_PROJECTS => Ok(self.list_projects(parse_args(name, arguments)?).await),
            other => Err(LoggingMcpError::InvalidRequest(format!("unknown tool: {other}"))),
        }
    }

    pub async fn query_logs(&self, req: QueryLogsRequest) -> ToolOutput {
        let Some(project_id) = self.resolve_project(req.project_id.clone()).await else {
            return ToolOutput::error(NO_PROJECT_MESSAGE);
        };

        let filter = match build_query_logs_filter(&req.filter, req.start_time.as_deref(), req.end_time.as_deref()) {
            Ok(f) => f,
            Err(e) => return ToolOutput::error(format!("Error: {e}")),
        };

        let query = EntriesQuery {
            project_id,
            filter,
            resource_names: req.resource_names.clone(),
            page_size: req.page_size.or(self.default_page_size),
            page_token: req.page_token.clone(),
            order_by: req.order_by,
        };
        let page = match self.api.entries(query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "queryLogs failed");
                return ToolOutput::error(format!("Error querying logs: {}", e.message));
            }
        };

        for entry in &page.entries {
            self.cache.add(entry.insert_id.clone(), entry.clone());
        }

        let response = QueryLogsResponse {
            logs: self.summarizer.summarize_all(&page.entries, req.summary_fields.as_deref()),
            page_size: page.entries.len(),
            next_page_token: page.next_page_token,
        };
        info!(count = response.page_size, "queryLogs returned entries");
        ToolOutput::text(to_pretty_json(&response))
    }

    pub async fn get_log_detail(&self, req: GetLogDetailRequest) -> ToolOutput {
        let Some(project_id) = self.resolve_project(req.project_id.clone()).await else {
            return ToolOutput::error(NO_PROJECT_MESSAGE);
        };

        let log_id = LogId::new(req.log_id.clone());
        if let Some(entry) = self.cache.get(&log_id) {
            debug!(log_id = %log_id, "log detail served from cache");
            return ToolOutput::text(format_log_entry(&entry));
        }
        debug!(log_id = %log_id, "log detail cache miss");

        let query = EntriesQuery {
            project_id,
            filter: build_log_filter(&req.log_id),
            page_size: Some(1),
            ..EntriesQuery::default()
        };
        let page = match self.api.entries(query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(log_id = %log_id, error = %e, "getLogDetail failed");
                return ToolOutput::error(format_error(&e));
            }
        };

        let Some(entry) = page.entries.into_iter().next() else {
            return ToolOutput::error(format_not_found(&req.log_id));
        };
        let text = format_log_entry(&entry);
        self.cache.add(log_id, entry);
        ToolOutput::text(text)
    }

    pub async fn list_projects(&self, req: ListProjectsRequest) -> ToolOutput {
        match self.api.list_projects(req).await {
            Ok(page) => {
                let projects: Vec<Value> = page
                    .projects
                    .iter()
                    .map(|p| {
                        json!({
                            "projectId": p.project_id,
                            "displayName": p.display_name.clone().unwrap_or_else(|| p.name.clone()),
                            "state": p.state,
                        })
                    })
                    .collect();
                let mut body = json!({ "projects": projects });
                if let Some(token) = page.next_page_token {
                    body["nextPageToken"] = json!(token);
                }
                body["totalCount"] = json!(page.projects.len());
                ToolOutput::text(to_json_safe(&body, true))
            }
            Err(e) => {
                warn!(error = %e, "listProjects failed");
                ToolOutput::error(format!("Error listing projects: {}", e.message))
            }
        }
    }

    async fn resolve_project(&self, explicit: Option<String>) -> Option<String> {
        match explicit.filter(|p| !p.is_empty()) {
            Some(p) => Some(p),
            None => self.api.default_project_id().await.filter(|p| !p.is_empty()),
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| LoggingMcpError::InvalidRequest(format!("invalid arguments for {tool}: {e}")))
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .map(|v| to_json_safe(&v, true))
        .unwrap_or_else(|_| crate::summary::COMPLEX_OBJECT.to_string())
}

/// 按 insertId 精确查找单条日志的过滤条件。值不做转义，原样拼入。
pub fn build_log_filter(log_id: &str) -> String {
    format!(r#"insertId="{log_id}""#)
}

pub fn format_log_entry(entry: &LogEntry) -> String {
    to_json_safe(&entry.to_value(), true)
}

pub fn format_error(err: &ApiError) -> String {
    let mut body = json!({ "error": err.message });
    if let Some(code) = err.code {
        body["code"] = json!(code.as_str());
    }
    to_json_safe(&body, true)
}

pub fn format_not_found(log_id: &str) -> String {
    to_json_safe(&json!({ "error": "Log entry not found", "logId": log_id }), true)
}

/// `tools/list` 返回的工具定义。
pub fn tool_definitions() -> Vec<Value> {
    let project_id = json!({
        "type": "string",
        "description": "Google Cloud project ID. If not provided, uses the default project"
    });
    vec![
        json!({
            "name": QUERY_LOGS,
            "description": "Returns a list of log summaries based on the given query",
            "inputSchema": {
                "type": "object",
                "required": ["filter"],
                "properties": {
                    "projectId": project_id,
                    "filter": { "type": "string", "description": "Cloud Logging query, e.g. severity=\"ERROR\"" },
                    "startTime": { "type": "string", "description": "ISO 8601 lower bound, e.g. 2024-01-01T00:00:00Z" },
                    "endTime": { "type": "string", "description": "ISO 8601 upper bound, must be after startTime" },
                    "resourceNames": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "e.g. projects/<project_id>/logs/run.googleapis.com%2Fstdout"
                    },
                    "pageSize": { "type": "integer" },
                    "pageToken": { "type": "string" },
                    "orderBy": {
                        "type": "object",
                        "properties": { "timestamp": { "type": "string", "enum": ["asc", "desc"] } },
                        "required": ["timestamp"]
                    },
                    "summaryFields": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Fields to include in the summary, e.g. ['labels.service', 'textPayload']"
                    }
                }
            }
        }),
        json!({
            "name": GET_LOG_DETAIL,
            "description": "Returns the whole record of a log with the given ID",
            "inputSchema": {
                "type": "object",
                "required": ["logId"],
                "properties": {
                    "projectId": project_id,
                    "logId": { "type": "string" }
                }
            }
        }),
        json!({
            "name": LIST_PROJECTS,
            "description": "Lists available Google Cloud projects that the authenticated user has access to",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "filter": { "type": "string", "description": "Optional filter to apply to the project list" },
                    "pageSize": { "type": "integer", "description": "Number of projects to return (default: 100)" },
                    "pageToken": { "type": "string", "description": "Page token for pagination" }
                }
            }
        }),
    ]
}
