use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{LoggingMcpError, Result};
use crate::mcp::{process_request, RpcRequest};
use crate::tools::LoggingTools;

/// 推送给 SSE 会话的消息，在输出流中转换为对应事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    Endpoint(String),
    Message(String),
}

impl SessionMessage {
    fn into_event(self) -> Event {
        match self {
            SessionMessage::Endpoint(url) => Event::default().event("endpoint").data(url),
            SessionMessage::Message(body) => Event::default().event("message").data(body),
        }
    }
}

pub type Sessions = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<SessionMessage>>>>;

#[derive(Clone)]
pub struct AppState {
    pub tools: Arc<LoggingTools>,
    pub sessions: Sessions,
    next_session: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(tools: Arc<LoggingTools>) -> Self {
        Self {
            tools,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    fn new_session_id(&self) -> String {
        let seq = self.next_session.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
        format!("{nanos:x}-{seq}")
    }
}

async fn sse_handler(State(state): State<AppState>) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let session_id = state.new_session_id();

    let _ = tx.send(SessionMessage::Endpoint(format!("/message?session_id={session_id}")));
    let watcher = tx.clone();
    state
        .sessions
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(session_id.clone(), tx);
    info!(%session_id, "sse session opened");

    // 客户端断开后接收端被丢弃，随即移除会话
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        watcher.closed().await;
        sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
        debug!(%session_id, "sse session closed");
    });

    let stream = UnboundedReceiverStream::new(rx).map(|msg| Ok::<_, axum::Error>(msg.into_event()));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(q): Query<MessageQuery>,
    payload: std::result::Result<Json<RpcRequest>, JsonRejection>,
) -> impl IntoResponse {
    let sender = {
        let sessions = state.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&q.session_id).cloned()
    };
    let Some(sender) = sender else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid request body: {e}") })),
            )
                .into_response()
        }
    };

    let tools = state.tools.clone();
    let sessions = state.sessions.clone();
    let session_id = q.session_id;
    tokio::spawn(async move {
        let Some(resp) = process_request(tools, req).await else {
            return;
        };
        let Ok(body) = serde_json::to_string(&resp) else {
            return;
        };
        if sender.send(SessionMessage::Message(body)).is_err() {
            debug!(%session_id, "sse client gone, dropping session");
            sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&session_id);
        }
    });
    StatusCode::ACCEPTED.into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/message", post(message_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn serve_http(tools: Arc<LoggingTools>, server: &ServerConfig) -> Result<()> {
    let router = build_router(AppState::new(tools));
    let addr = server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LoggingMcpError::Config(format!("bind {addr} failed: {e}")))?;
    info!("HTTP server listening on http://{addr}");
    axum::serve(listener, router).await.map_err(|e| {
        warn!(error = %e, "http server stopped");
        e.into()
    })
}

/// 在后台运行 HTTP 传输；失败只记录日志，不影响 stdio 传输。
pub fn spawn_http(tools: Arc<LoggingTools>, server: ServerConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve_http(tools, &server).await {
            error!(error = %e, "http transport failed, continuing with stdio only");
        }
    })
}
