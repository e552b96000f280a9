use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cloud_logging_mcp::cache::LogCache;
use cloud_logging_mcp::config::{Config, ServerMode};
use cloud_logging_mcp::http::{serve_http, spawn_http};
use cloud_logging_mcp::mcp::run_stdio;
use cloud_logging_mcp::rest::GoogleCloudLoggingClient;
use cloud_logging_mcp::summary::Summarizer;
use cloud_logging_mcp::tools::LoggingTools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout 留给 JSON-RPC，日志只写 stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match env::args().nth(1) {
        Some(path) => Config::load_from_path(Path::new(&path)).with_context(|| format!("loading config {path}"))?,
        None => Config::default(),
    };
    config.apply_env();

    if config.gcp.project_id.is_none() {
        info!("no default project configured, tools will require projectId");
    }

    let api = Arc::new(GoogleCloudLoggingClient::new(config.gcp.clone())?);
    let cache = Arc::new(LogCache::new(config.cache));
    let tools = Arc::new(
        LoggingTools::new(api, cache, Summarizer::new()?).with_default_page_size(config.gcp.default_page_size),
    );

    info!(mode = ?config.server.mode, "starting cloud logging mcp server");
    match config.server.mode {
        ServerMode::Stdio => run_stdio(tools).await?,
        ServerMode::Http => serve_http(tools, &config.server).await?,
        ServerMode::Both => {
            let http_task = spawn_http(tools.clone(), config.server.clone());
            // stdin 关闭即退出，HTTP 服务随进程结束
            run_stdio(tools).await?;
            http_task.abort();
        }
    }

    Ok(())
}
