use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeRangeError {
    #[error("Invalid time format: {0}. Expected ISO 8601 format (e.g., 2024-01-01T00:00:00Z)")]
    InvalidFormat(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Start time must be before end time")]
    StartNotBeforeEnd,
}

// 前缀形状检查；小数秒与时区后缀均可选，由后续解析负责校验
fn iso_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").ok())
        .as_ref()
}

/// 校验时间字符串，成功时原样返回。
pub fn validate_time_string(input: &str) -> Result<&str, TimeRangeError> {
    parse_instant(input).map(|_| input)
}

/// 解析为 UTC 时刻。不带时区后缀的时间按 UTC 处理。
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, TimeRangeError> {
    let shape_ok = iso_prefix().map(|re| re.is_match(input)).unwrap_or(false);
    if !shape_ok {
        return Err(TimeRangeError::InvalidFormat(input.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimeRangeError::InvalidDate(input.to_string()))
}

/// 生成 `timestamp>="start"` / `timestamp<="end"` 子句，两者都没有时返回空串。
/// 两端都给出时要求 start 严格早于 end。
pub fn build_timestamp_filter(start: Option<&str>, end: Option<&str>) -> Result<String, TimeRangeError> {
    let start = start.filter(|s| !s.is_empty());
    let end = end.filter(|s| !s.is_empty());

    let mut clauses = Vec::with_capacity(2);
    let mut bounds = (None, None);

    if let Some(s) = start {
        bounds.0 = Some(parse_instant(s)?);
        clauses.push(format!(r#"timestamp>="{s}""#));
    }
    if let Some(e) = end {
        bounds.1 = Some(parse_instant(e)?);
        clauses.push(format!(r#"timestamp<="{e}""#));
    }

    if let (Some(s), Some(e)) = bounds {
        if s >= e {
            return Err(TimeRangeError::StartNotBeforeEnd);
        }
    }

    Ok(clauses.join(" AND "))
}

/// 组合调用方过滤条件与时间子句；只给调用方条件加括号。
pub fn combine_filters(existing: &str, timestamp_filter: &str) -> String {
    if timestamp_filter.is_empty() {
        return existing.to_string();
    }
    if existing.is_empty() {
        return timestamp_filter.to_string();
    }
    format!("({existing}) AND {timestamp_filter}")
}

pub fn build_query_logs_filter(
    filter: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<String, TimeRangeError> {
    let timestamp_filter = build_timestamp_filter(start, end)?;
    Ok(combine_filters(filter, &timestamp_filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_iso_variants() {
        for s in [
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00",
            "2024-01-01T00:00:00.123Z",
            "2024-01-01T00:00:00.123",
            "2024-01-01T09:00:00+09:00",
        ] {
            assert_eq!(validate_time_string(s), Ok(s), "{s}");
        }
    }

    #[test]
    fn rejects_bad_shape() {
        for s in ["invalid", "2024-01-01", "-1h", "", "2024/01/01T00:00:00Z"] {
            let err = validate_time_string(s).unwrap_err();
            assert!(matches!(err, TimeRangeError::InvalidFormat(_)), "{s}");
            assert!(err.to_string().contains("Invalid time format"));
        }
    }

    #[test]
    fn rejects_impossible_dates() {
        for s in ["2024-13-01T00:00:00Z", "2024-01-32T00:00:00Z", "2023-02-29T00:00:00", "2024-01-01T00:00:00junk"] {
            let err = validate_time_string(s).unwrap_err();
            assert!(matches!(err, TimeRangeError::InvalidDate(_)), "{s}");
            assert!(err.to_string().contains("Invalid date"));
        }
    }

    #[test]
    fn timestamp_filter_clauses() {
        assert_eq!(
            build_timestamp_filter(Some("2024-01-01T00:00:00Z"), Some("2024-01-02T00:00:00Z")).unwrap(),
            r#"timestamp>="2024-01-01T00:00:00Z" AND timestamp<="2024-01-02T00:00:00Z""#
        );
        assert_eq!(
            build_timestamp_filter(Some("2024-01-01T00:00:00Z"), None).unwrap(),
            r#"timestamp>="2024-01-01T00:00:00Z""#
        );
        assert_eq!(
            build_timestamp_filter(Some(""), Some("2024-01-15T00:00:00Z")).unwrap(),
            r#"timestamp<="2024-01-15T00:00:00Z""#
        );
        assert_eq!(build_timestamp_filter(None, None).unwrap(), "");
        assert_eq!(build_timestamp_filter(Some(""), Some("")).unwrap(), "");
    }

    #[test]
    fn timestamp_filter_rejects_inverted_or_equal_range() {
        let equal = build_timestamp_filter(Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(equal, Err(TimeRangeError::StartNotBeforeEnd));
        assert_eq!(equal.unwrap_err().to_string(), "Start time must be before end time");

        let swapped = build_timestamp_filter(Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(swapped, Err(TimeRangeError::StartNotBeforeEnd));

        // 不同时区表示的同一时刻也视为相等
        let same_instant = build_timestamp_filter(Some("2024-01-01T09:00:00+09:00"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(same_instant, Err(TimeRangeError::StartNotBeforeEnd));
    }

    #[test]
    fn timestamp_filter_reports_first_invalid_bound() {
        let err = build_timestamp_filter(Some("invalid"), Some("2024-13-01T00:00:00Z")).unwrap_err();
        assert!(matches!(err, TimeRangeError::InvalidFormat(_)));
        let err = build_timestamp_filter(Some("2024-01-01T00:00:00Z"), Some("2024-13-01T23:59:59Z")).unwrap_err();
        assert!(matches!(err, TimeRangeError::InvalidDate(_)));
    }

    #[test]
    fn combine() {
        assert_eq!(combine_filters("", ""), "");
        assert_eq!(combine_filters(r#"a="b""#, ""), r#"a="b""#);
        assert_eq!(combine_filters("", r#"t>="x""#), r#"t>="x""#);
        assert_eq!(combine_filters(r#"a="b""#, r#"t>="x""#), r#"(a="b") AND t>="x""#);
        assert_eq!(
            combine_filters(r#"severity="ERROR" OR severity="CRITICAL""#, r#"timestamp>="2024-01-01T00:00:00Z""#),
            r#"(severity="ERROR" OR severity="CRITICAL") AND timestamp>="2024-01-01T00:00:00Z""#
        );
    }

    #[test]
    fn query_logs_filter() {
        assert_eq!(
            build_query_logs_filter(r#"severity="ERROR""#, Some("2024-01-01T00:00:00Z"), Some("2024-01-01T23:59:59Z"))
                .unwrap(),
            r#"(severity="ERROR") AND timestamp>="2024-01-01T00:00:00Z" AND timestamp<="2024-01-01T23:59:59Z""#
        );
        assert_eq!(
            build_query_logs_filter("", Some("2024-01-01T00:00:00Z"), Some("2024-01-01T23:59:59Z")).unwrap(),
            r#"timestamp>="2024-01-01T00:00:00Z" AND timestamp<="2024-01-01T23:59:59Z""#
        );
        assert_eq!(build_query_logs_filter(r#"resource.type="k8s_container""#, None, None).unwrap(), r#"resource.type="k8s_container""#);
        assert!(build_query_logs_filter("x", Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z")).is_err());
    }
}
