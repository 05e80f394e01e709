use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        DefaultBodyLimit, Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use shared::{
    domain::SessionId,
    error::{ApiError, ApiException},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod app_state;
mod config;
mod prompt;
mod tools;

use app_state::{AgentProfile, AppState, SessionSummary};
use config::load_settings;
use tools::{dispatch, ToolCall};

const MAX_TOOL_CALL_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct ToolCallResponse {
    status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    if settings.google_api_key.is_none() {
        warn!("GOOGLE_API_KEY is not set; tool calls can only arrive over HTTP");
    }

    let state = AppState::new(&settings);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "voice agent listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/agent", get(agent_profile))
        .route("/sessions", get(list_sessions))
        .route(
            "/sessions/:session_id/tool_calls",
            post(post_tool_call).layer(DefaultBodyLimit::max(MAX_TOOL_CALL_BYTES)),
        )
        .route("/voice", get(voice_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn agent_profile(State(state): State<Arc<AppState>>) -> Json<AgentProfile> {
    Json(state.agent.clone())
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list().await)
}

async fn post_tool_call(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(call): Json<ToolCall>,
) -> Result<Json<ToolCallResponse>, (StatusCode, Json<ApiError>)> {
    let session_id = SessionId(session_id);
    if !state.sessions.contains(session_id).await {
        return Err(not_found(session_id));
    }

    info!(%session_id, tool = %call.name, "function call started");
    let outcome = dispatch(&call).map_err(|error| {
        warn!(%session_id, tool = %call.name, %error, "function call rejected");
        (StatusCode::BAD_REQUEST, Json(ApiError::from(error)))
    })?;

    state
        .sessions
        .relay(session_id, outcome.message)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, Json(ApiError::from(e))))?;
    info!(
        %session_id,
        tool = %call.name,
        status = %outcome.status,
        "function call finished"
    );

    Ok(Json(ToolCallResponse {
        status: outcome.status,
    }))
}

fn not_found(session_id: SessionId) -> (StatusCode, Json<ApiError>) {
    let err = ApiException::session_not_found(session_id);
    (StatusCode::NOT_FOUND, Json(ApiError::from(err)))
}

async fn voice_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| voice_connection(state, socket))
}

async fn voice_connection(state: Arc<AppState>, socket: WebSocket) {
    let (session_id, mut relay_rx) = state.sessions.register().await;
    info!(%session_id, "voice client connected");

    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(event) = relay_rx.recv().await {
            let text = match event.to_text() {
                Ok(v) => v,
                Err(error) => {
                    warn!(%session_id, %error, "failed to encode envelope");
                    continue;
                }
            };
            debug!(%session_id, kind = event.kind(), "relaying envelope");
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Audio frames would arrive here; without a speech pipeline they are
    // read and dropped until the client goes away.
    while let Some(Ok(msg)) = receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    state.sessions.remove(session_id).await;
    send_task.abort();
    info!(%session_id, "voice client disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
