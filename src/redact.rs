//! 敏感信息脱敏：凭据、卡号、邮箱、IPv4。

use regex::{Captures, Regex, RegexBuilder};

use crate::error::{LoggingMcpError, Result};

const CREDENTIAL_KEYS: &str = r"key|api[_-]?key|token|secret|password|credential|auth";

/// 脱敏规则，按声明顺序依次作用于整段文本。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionKind {
    /// 带引号的凭据值，保留键名与引号
    Credential,
    CardNumber,
    Email,
    Ipv4,
}

impl RedactionKind {
    pub const ALL: [RedactionKind; 4] = [
        RedactionKind::Credential,
        RedactionKind::CardNumber,
        RedactionKind::Email,
        RedactionKind::Ipv4,
    ];

    fn pattern(&self) -> String {
        match self {
            // regex crate 不支持反向引用，因此键名两侧的引号写成三个分支
            RedactionKind::Credential => format!(
                r#"((?:"(?:{k})"|'(?:{k})'|(?:{k}))\s*[:=]\s*['"])([^'"]+)(['"])"#,
                k = CREDENTIAL_KEYS
            ),
            // 单词边界与数字只按 ASCII 判定，中日韩文字紧贴时同样能命中
            RedactionKind::CardNumber => r"(?-u:\b)(?:[0-9]{4}[-\s]?){3}[0-9]{4}(?-u:\b)".to_string(),
            RedactionKind::Email => {
                r"(?-u:\b)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}(?-u:\b)".to_string()
            }
            RedactionKind::Ipv4 => {
                r"(?-u:\b)[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}(?-u:\b)".to_string()
            }
        }
    }
}

/// 脱敏器。正则在构造时编译一次，之后只读，可在任意线程共享。
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<(RedactionKind, Regex)>,
}

impl Redactor {
    pub fn new() -> Result<Self> {
        let rules = RedactionKind::ALL
            .iter()
            .map(|kind| compile(&kind.pattern(), *kind == RedactionKind::Credential).map(|re| (*kind, re)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn redact(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut out = text.to_string();
        for (kind, re) in &self.rules {
            out = match kind {
                RedactionKind::Credential => re
                    .replace_all(&out, |caps: &Captures| {
                        format!("{}{}{}", &caps[1], mask_secret(&caps[2]), &caps[3])
                    })
                    .into_owned(),
                _ => re
                    .replace_all(&out, |caps: &Captures| stars(caps[0].chars().count()))
                    .into_owned(),
            };
        }
        out
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| LoggingMcpError::Regex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// 不超过 8 个字符时全部遮盖，否则保留首尾各 4 个字符。
fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return stars(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", stars(chars.len() - 8))
}

fn stars(n: usize) -> String {
    "*".repeat(n)
}
