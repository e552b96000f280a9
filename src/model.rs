use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 日志唯一标识（云端的 insertId）。仅作为缓存键使用。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(String);

impl LogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LogId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
    // 未知级别统一归为 DEFAULT
    #[default]
    #[serde(other)]
    Default,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 云端返回的一条完整日志记录。
///
/// 除 payload 以外的元数据（labels、resource、httpRequest、trace 等）原样保存在
/// `metadata` 中，键顺序与接收顺序一致，核心逻辑只通过字段路径访问它们。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "insertId", default)]
    pub insert_id: LogId,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(rename = "textPayload", default, skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<String>,
    #[serde(rename = "jsonPayload", default, skip_serializing_if = "Option::is_none")]
    pub json_payload: Option<Value>,
    #[serde(rename = "protoPayload", default, skip_serializing_if = "Option::is_none")]
    pub proto_payload: Option<Value>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl LogEntry {
    pub fn new(insert_id: impl Into<LogId>, timestamp: impl Into<String>, severity: Severity) -> Self {
        Self {
            insert_id: insert_id.into(),
            timestamp: timestamp.into(),
            severity,
            text_payload: None,
            json_payload: None,
            proto_payload: None,
            metadata: Map::new(),
        }
    }

    pub fn with_text_payload(mut self, text: impl Into<String>) -> Self {
        self.text_payload = Some(text.into());
        self
    }

    pub fn with_json_payload(mut self, payload: Value) -> Self {
        self.json_payload = Some(payload);
        self
    }

    pub fn with_proto_payload(mut self, payload: Value) -> Self {
        self.proto_payload = Some(payload);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// 以通用 JSON 对象的形式查看整条记录，供字段路径解析使用。
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// 单条日志的摘要视图，按请求即时计算，不做存储。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub id: LogId,
    pub timestamp: String,
    pub severity: Severity,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub timestamp: SortDirection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogsRequest {
    #[serde(default)]
    pub project_id: Option<String>,
    pub filter: String,
    #[serde(default, alias = "start_time")]
    pub start_time: Option<String>,
    #[serde(default, alias = "end_time")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub resource_names: Option<Vec<String>>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub summary_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogsResponse {
    pub logs: Vec<LogSummary>,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLogDetailRequest {
    #[serde(default)]
    pub project_id: Option<String>,
    pub log_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsRequest {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    DeleteRequested,
    DeleteInProgress,
    #[default]
    #[serde(other)]
    Active,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: ProjectState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_entry_keeps_passthrough_metadata_in_order() {
        let raw = json!({
            "insertId": "abc",
            "timestamp": "2024-01-01T00:00:00Z",
            "severity": "ERROR",
            "labels": { "service": "api" },
            "trace": "projects/p/traces/1",
            "resource": { "type": "global" }
        });
        let entry: LogEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.insert_id.as_str(), "abc");
        assert_eq!(entry.severity, Severity::Error);
        let keys: Vec<&str> = entry.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["labels", "trace", "resource"]);
    }

    #[test]
    fn unknown_or_missing_severity_is_default() {
        let entry: LogEntry = serde_json::from_value(json!({
            "insertId": "a",
            "timestamp": "t",
            "severity": "LOUD"
        }))
        .unwrap();
        assert_eq!(entry.severity, Severity::Default);

        let entry: LogEntry = serde_json::from_value(json!({ "insertId": "b" })).unwrap();
        assert_eq!(entry.severity, Severity::Default);
    }

    #[test]
    fn catch_all_variants_serialize_by_name() {
        assert_eq!(serde_json::to_value(Severity::Default).unwrap(), json!("DEFAULT"));
        assert_eq!(serde_json::to_value(Severity::Emergency).unwrap(), json!("EMERGENCY"));

        let state: ProjectState = serde_json::from_value(json!("DELETE_IN_PROGRESS")).unwrap();
        assert_eq!(state, ProjectState::DeleteInProgress);
        let state: ProjectState = serde_json::from_value(json!("STATE_UNSPECIFIED")).unwrap();
        assert_eq!(state, ProjectState::Active);
        assert_eq!(serde_json::to_value(ProjectState::Active).unwrap(), json!("ACTIVE"));
    }

    #[test]
    fn query_request_accepts_camel_case() {
        let req: QueryLogsRequest = serde_json::from_value(json!({
            "projectId": "p",
            "filter": "severity=\"ERROR\"",
            "startTime": "2024-01-01T00:00:00Z",
            "orderBy": { "timestamp": "asc" },
            "summaryFields": ["labels.service"]
        }))
        .unwrap();
        assert_eq!(req.project_id.as_deref(), Some("p"));
        assert_eq!(req.start_time.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(req.order_by.map(|o| o.timestamp), Some(SortDirection::Asc));
        assert!(req.end_time.is_none());
    }

    #[test]
    fn query_request_requires_filter() {
        let res: std::result::Result<QueryLogsRequest, _> =
            serde_json::from_value(json!({ "projectId": "p", "startTime": "-1h" }));
        assert!(res.is_err());
    }
}
