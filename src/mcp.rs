use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::{LoggingMcpError, Result};
use crate::tools::{tool_definitions, LoggingTools};

pub const SERVER_NAME: &str = "Google Cloud Logging MCP";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub async fn run_stdio(tools: Arc<LoggingTools>) -> Result<()> {
    serve(tools, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// 逐行读取 JSON-RPC 请求并逐行写出响应；通知不产生输出。
pub async fn serve<R, W>(tools: Arc<LoggingTools>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let req: RpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unparseable rpc message");
                let resp = error_response(Value::Null, PARSE_ERROR, format!("parse error: {e}"));
                write_response(&mut writer, &resp).await?;
                continue;
            }
        };

        if let Some(resp) = process_request(tools.clone(), req).await {
            write_response(&mut writer, &resp).await?;
        }
    }
    Ok(())
}

pub async fn process_request(tools: Arc<LoggingTools>, req: RpcRequest) -> Option<RpcResponse> {
    debug!(method = %req.method, "rpc request");
    let resp = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "notifications/initialized" | "notifications/cancelled" => return None,
        "ping" => ok_response(&req, json!({})),
        "tools/list" => ok_response(&req, json!({ "tools": tool_definitions() })),
        "tools/call" => handle_call_tool(&tools, &req).await,
        _ if req.id.is_null() && req.method.starts_with("notifications/") => return None,
        _ => rpc_error(&req, METHOD_NOT_FOUND, format!("method not found: {}", req.method)),
    };
    Some(resp)
}

fn handle_initialize(req: &RpcRequest) -> RpcResponse {
    ok_response(
        req,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}

async fn handle_call_tool(tools: &LoggingTools, req: &RpcRequest) -> RpcResponse {
    let params: CallToolParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => return rpc_error(req, INVALID_PARAMS, format!("invalid params: {e}")),
    };

    match tools.call(&params.name, params.arguments).await {
        Ok(output) => ok_response(req, serde_json::to_value(output).unwrap_or(Value::Null)),
        Err(e @ LoggingMcpError::InvalidRequest(_)) => rpc_error(req, INVALID_PARAMS, e.to_string()),
        Err(e) => rpc_error(req, -32603, e.to_string()),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, resp: &RpcResponse) -> Result<()> {
    let line = serde_json::to_string(resp).unwrap_or_else(|_| "{}".to_string());
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn ok_response(req: &RpcRequest, result: Value) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id: req.id.clone(),
        result: Some(result),
        error: None,
    }
}

fn rpc_error(req: &RpcRequest, code: i32, message: String) -> RpcResponse {
    error_response(req.id.clone(), code, message)
}

fn error_response(id: Value, code: i32, message: String) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(RpcError { code, message }),
    }
}
