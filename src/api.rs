//! 日志查询协作方的边界：查询参数、结果页与分类错误。
//! 真实的网络实现见 `rest` 模块，测试中可替换为内存实现。

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ListProjectsRequest, LogEntry, OrderBy, ProjectPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    PermissionDenied,
    InvalidArgument,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::NotFound => "NOT_FOUND",
            ApiErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ApiErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ApiErrorCode::Internal => "INTERNAL",
            ApiErrorCode::Unavailable => "UNAVAILABLE",
            ApiErrorCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// gRPC 状态码映射，未知值一律归为 INTERNAL。
    pub fn from_grpc(code: i64) -> Self {
        match code {
            3 => ApiErrorCode::InvalidArgument,
            5 => ApiErrorCode::NotFound,
            7 => ApiErrorCode::PermissionDenied,
            14 => ApiErrorCode::Unavailable,
            16 => ApiErrorCode::Unauthenticated,
            _ => ApiErrorCode::Internal,
        }
    }

    /// REST 错误体中的 `status` 字段。
    pub fn from_status_name(status: &str) -> Option<Self> {
        match status {
            "NOT_FOUND" => Some(ApiErrorCode::NotFound),
            "PERMISSION_DENIED" => Some(ApiErrorCode::PermissionDenied),
            "INVALID_ARGUMENT" => Some(ApiErrorCode::InvalidArgument),
            "INTERNAL" => Some(ApiErrorCode::Internal),
            "UNAVAILABLE" => Some(ApiErrorCode::Unavailable),
            "UNAUTHENTICATED" => Some(ApiErrorCode::Unauthenticated),
            _ => None,
        }
    }

    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => ApiErrorCode::InvalidArgument,
            401 => ApiErrorCode::Unauthenticated,
            403 => ApiErrorCode::PermissionDenied,
            404 => ApiErrorCode::NotFound,
            503 | 504 => ApiErrorCode::Unavailable,
            _ => ApiErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ApiErrorCode>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntriesQuery {
    pub project_id: String,
    pub filter: String,
    pub resource_names: Option<Vec<String>>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    pub order_by: Option<OrderBy>,
}

#[derive(Debug, Clone, Default)]
pub struct EntriesPage {
    pub entries: Vec<LogEntry>,
    pub next_page_token: Option<String>,
}

/// 云端日志服务。实现方负责网络 I/O，本 crate 只依赖这一组异步操作。
pub trait CloudLoggingApi: Send + Sync {
    fn entries(&self, query: EntriesQuery) -> BoxFuture<'_, Result<EntriesPage, ApiError>>;

    fn list_projects(&self, request: ListProjectsRequest) -> BoxFuture<'_, Result<ProjectPage, ApiError>>;

    fn default_project_id(&self) -> BoxFuture<'_, Option<String>>;
}
