//! 日志摘要：按字段路径拼接，或按固定优先级从 payload 中提取一段短文本。
//! 输出的摘要一律经过脱敏。

use serde_json::Value;

use crate::error::Result;
use crate::model::{LogEntry, LogSummary};
use crate::path::resolve;
use crate::redact::Redactor;

/// 默认提取路径的最大字符数（超出部分以 `...` 截断）
pub const SUMMARY_MAX_CHARS: usize = 300;
/// 嵌套遍历与序列化的深度上限
pub const MAX_DEPTH: usize = 64;
/// 无法安全序列化时使用的占位文本
pub const COMPLEX_OBJECT: &str = "[Complex Object]";

const PRETTY_MAX_CHARS: usize = 1000;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone)]
pub struct Summarizer {
    redactor: Redactor,
}

impl Summarizer {
    pub fn new() -> Result<Self> {
        Ok(Self::with_redactor(Redactor::new()?))
    }

    pub fn with_redactor(redactor: Redactor) -> Self {
        Self { redactor }
    }

    pub fn summarize(&self, entry: &LogEntry, fields: Option<&[String]>) -> LogSummary {
        let summary = match fields {
            Some(fields) if !fields.is_empty() => {
                let text = self.summary_from_fields(entry, fields);
                if text.is_empty() {
                    self.default_summary(entry)
                } else {
                    text
                }
            }
            _ => self.default_summary(entry),
        };

        LogSummary {
            id: entry.insert_id.clone(),
            timestamp: entry.timestamp.clone(),
            severity: entry.severity,
            summary,
        }
    }

    pub fn summarize_all(&self, entries: &[LogEntry], fields: Option<&[String]>) -> Vec<LogSummary> {
        entries.iter().map(|e| self.summarize(e, fields)).collect()
    }

    fn summary_from_fields(&self, entry: &LogEntry, fields: &[String]) -> String {
        let root = entry.to_value();
        let parts: Vec<String> = fields
            .iter()
            .filter_map(|field| {
                let rendered = resolve(&root, field).and_then(render_field)?;
                Some(format!("{field}: {rendered}"))
            })
            .collect();

        if parts.is_empty() {
            return String::new();
        }
        self.redactor.redact(&parts.join(", "))
    }

    fn default_summary(&self, entry: &LogEntry) -> String {
        let text = entry
            .text_payload
            .clone()
            .or_else(|| message_field(entry.json_payload.as_ref()))
            .or_else(|| message_field(entry.proto_payload.as_ref()))
            .or_else(|| entry.json_payload.as_ref().and_then(|v| find_message(v, 0)))
            .or_else(|| entry.proto_payload.as_ref().map(|v| to_json_safe(v, false)))
            .or_else(|| entry.json_payload.as_ref().map(|v| to_json_safe(v, false)))
            .unwrap_or_default();

        truncate(&self.redactor.redact(&text), SUMMARY_MAX_CHARS)
    }
}

/// 序列化为 JSON 文本；嵌套过深或序列化失败时返回占位文本，不会报错。
pub fn to_json_safe(value: &Value, pretty: bool) -> String {
    if exceeds_depth(value, MAX_DEPTH) {
        return COMPLEX_OBJECT.to_string();
    }
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|_| COMPLEX_OBJECT.to_string())
}

fn exceeds_depth(value: &Value, remaining: usize) -> bool {
    match value {
        Value::Object(map) => remaining == 0 || map.values().any(|v| exceeds_depth(v, remaining - 1)),
        Value::Array(items) => remaining == 0 || items.iter().any(|v| exceeds_depth(v, remaining - 1)),
        _ => false,
    }
}

fn render_field(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Object(_) | Value::Array(_) => {
            let pretty = to_json_safe(value, true);
            if pretty.chars().count() <= PRETTY_MAX_CHARS {
                Some(pretty)
            } else {
                Some(to_json_safe(value, false))
            }
        }
    }
}

fn message_field(payload: Option<&Value>) -> Option<String> {
    payload?.get("message")?.as_str().map(str::to_string)
}

/// 深度优先查找第一个 `message` 键，遍历顺序即键的插入顺序。
fn find_message(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(message) = map.get("message") {
                return Some(coerce_to_string(message));
            }
            map.values().find_map(|v| find_message(v, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|v| find_message(v, depth + 1)),
        _ => None,
    }
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => to_json_safe(other, false),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}
