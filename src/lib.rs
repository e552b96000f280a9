//! Google Cloud Logging MCP 服务核心库
//! 纯逻辑（脱敏、路径解析、摘要、缓存、时间过滤）与网络边界（api/rest）、传输层（mcp/http）分离。

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod model;
pub mod path;
pub mod redact;
pub mod rest;
pub mod summary;
pub mod time_range;
pub mod tools;
