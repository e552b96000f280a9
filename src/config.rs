use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{LoggingMcpError, Result};

pub const ENV_PROJECT_ID: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Stdio,
    Http,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: ServerMode,
    #[serde(default)]
    pub http_addr: Option<String>,
    #[serde(default)]
    pub http_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: ServerMode::Stdio,
            http_addr: None,
            http_port: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!(
            "{}:{}",
            self.http_addr.as_deref().unwrap_or("127.0.0.1"),
            self.http_port.unwrap_or(3000)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    /// 原样作为 Bearer 令牌发送，不做获取或刷新
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_logging_endpoint")]
    pub logging_endpoint: String,
    #[serde(default = "default_resource_manager_endpoint")]
    pub resource_manager_endpoint: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_logging_endpoint() -> String {
    "https://logging.googleapis.com".to_string()
}

fn default_resource_manager_endpoint() -> String {
    "https://cloudresourcemanager.googleapis.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            access_token: None,
            logging_endpoint: default_logging_endpoint(),
            resource_manager_endpoint: default_resource_manager_endpoint(),
            default_page_size: default_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
}

impl Config {
    /// 按扩展名选择 YAML（.yaml/.yml）或 JSON 解析。
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LoggingMcpError::Config(format!("read {} failed: {e}", path.display())))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
            Some("yaml" | "yml")
        );
        if is_yaml {
            Self::from_yaml(&raw)
        } else {
            Self::from_json(&raw)
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| LoggingMcpError::Config(format!("invalid yaml config: {e}")))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| LoggingMcpError::Config(format!("invalid json config: {e}")))
    }

    /// 用环境变量补齐未配置的项目 ID 与访问令牌；配置文件中的值优先。
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.gcp.project_id.as_deref().map_or(true, str::is_empty) {
            self.gcp.project_id = non_empty(ENV_PROJECT_ID);
        }
        if self.gcp.access_token.as_deref().map_or(true, str::is_empty) {
            self.gcp.access_token = non_empty(ENV_ACCESS_TOKEN);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_when_sections_missing() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.server.mode, ServerMode::Stdio);
        assert_eq!(cfg.server.bind_addr(), "127.0.0.1:3000");
        assert_eq!(cfg.cache.max_entries, 1000);
        assert_eq!(cfg.cache.ttl_ms, 1_800_000);
        assert_eq!(cfg.gcp.default_page_size, 100);
        assert_eq!(cfg.gcp.logging_endpoint, "https://logging.googleapis.com");
    }

    #[test]
    fn loads_yaml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  mode: both\n  http_port: 8080\ncache:\n  max_entries: 50\ngcp:\n  project_id: demo"
        )
        .unwrap();
        let cfg = Config::load_from_path(file.path()).unwrap();
        assert_eq!(cfg.server.mode, ServerMode::Both);
        assert_eq!(cfg.server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(cfg.cache.max_entries, 50);
        assert_eq!(cfg.cache.ttl_ms, 1_800_000);
        assert_eq!(cfg.gcp.project_id.as_deref(), Some("demo"));
    }

    #[test]
    fn loads_json_otherwise() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"cache": {{"ttl_ms": 5000}}}}"#).unwrap();
        let cfg = Config::load_from_path(file.path()).unwrap();
        assert_eq!(cfg.cache.ttl_ms, 5000);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(file, "server: [unclosed").unwrap();
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, LoggingMcpError::Config(_)));

        let err = Config::load_from_path(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("read"));
    }

    #[test]
    fn env_fills_only_missing_values() {
        let lookup = |key: &str| match key {
            ENV_PROJECT_ID => Some("from-env".to_string()),
            ENV_ACCESS_TOKEN => Some("token".to_string()),
            _ => None,
        };

        let mut cfg = Config::default();
        cfg.apply_env_with(lookup);
        assert_eq!(cfg.gcp.project_id.as_deref(), Some("from-env"));
        assert_eq!(cfg.gcp.access_token.as_deref(), Some("token"));

        let mut cfg = Config::default();
        cfg.gcp.project_id = Some("from-file".to_string());
        cfg.apply_env_with(lookup);
        assert_eq!(cfg.gcp.project_id.as_deref(), Some("from-file"));
    }
}
