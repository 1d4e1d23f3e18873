use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::{
    domain::{ConsoleId, SessionSnapshot},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminLoginResponse, ConsoleState, CreatePresentationRequest, HistoryResponse,
        JoinRequest, JoinResponse, ServerEvent, VoteRequest, VoteResponse,
    },
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, warn};

mod app_state;
pub mod config;

pub use app_state::AppState;

type HttpResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
struct WsQuery {
    session_id: String,
}

pub fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/admin/login", post(http_admin_login))
        .route(
            "/admin/:console_id/presentation",
            post(http_create_presentation),
        )
        .route("/admin/:console_id/start", post(http_start))
        .route("/admin/:console_id/next", post(http_next))
        .route("/admin/:console_id/previous", post(http_previous))
        .route("/admin/:console_id/reset", post(http_reset))
        .route("/admin/:console_id/start_new", post(http_start_new))
        .route("/admin/:console_id/session", get(http_console_state))
        .route("/admin/:console_id/history", get(http_history))
        .route("/sessions/join", post(http_join))
        .route("/sessions/:session_id", get(http_session_snapshot))
        .route("/sessions/:session_id/votes", post(http_vote))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

async fn http_admin_login(State(state): State<Arc<AppState>>) -> Json<AdminLoginResponse> {
    Json(server_api::admin_login(&state.api).await)
}

async fn http_create_presentation(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
    Json(req): Json<CreatePresentationRequest>,
) -> HttpResult<ConsoleState> {
    let created = server_api::create_presentation(&state.api, &ConsoleId(console_id), req)
        .await
        .map_err(reject)?;
    Ok(Json(created.state))
}

async fn http_start(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<ConsoleState> {
    let console = server_api::start_presentation(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(console))
}

async fn http_next(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<ConsoleState> {
    let console = server_api::next_question(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(console))
}

async fn http_previous(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<ConsoleState> {
    let console = server_api::previous_question(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(console))
}

async fn http_reset(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<ConsoleState> {
    let console = server_api::reset_presentation(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(console))
}

async fn http_start_new(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<ConsoleState> {
    let archived = server_api::start_new_presentation(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(archived.state))
}

async fn http_console_state(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<ConsoleState> {
    let console = server_api::console_state(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(console))
}

async fn http_history(
    State(state): State<Arc<AppState>>,
    Path(console_id): Path<String>,
) -> HttpResult<HistoryResponse> {
    let history = server_api::history(&state.api, &ConsoleId(console_id))
        .await
        .map_err(reject)?;
    Ok(Json(history))
}

async fn http_join(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinRequest>,
) -> HttpResult<JoinResponse> {
    let joined = server_api::join_presentation(&state.api, req)
        .await
        .map_err(reject)?;
    Ok(Json(joined))
}

async fn http_vote(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> HttpResult<VoteResponse> {
    let vote = server_api::submit_vote(&state.api, &session_id, req)
        .await
        .map_err(reject)?;
    Ok(Json(vote))
}

async fn http_session_snapshot(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> HttpResult<SessionSnapshot> {
    let snapshot = server_api::session_snapshot(&state.api, &session_id)
        .await
        .map_err(reject)?;
    Ok(Json(snapshot))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket, q.session_id))
}

/// Streams events for one session: the current snapshot first, then every
/// update until the session closes or the peer goes away.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let (snapshot, events) = match server_api::subscribe(&state.api, &session_id).await {
        Ok(subscription) => subscription,
        Err(err) => {
            let _ = send_event(&mut sender, &ServerEvent::Error(err)).await;
            return;
        }
    };
    let code = snapshot.presentation.id.clone();
    if send_event(&mut sender, &ServerEvent::SessionUpdated { snapshot })
        .await
        .is_err()
    {
        return;
    }
    debug!(session_id = %code, "websocket subscriber attached");

    let send_state = state.clone();
    let send_task = tokio::spawn(async move {
        let mut events = BroadcastStream::new(events);
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(session_id = %code, skipped, "websocket subscriber lagged");
                    // Start over from a fresh snapshot; the backlog is older than it.
                    match server_api::subscribe(&send_state.api, code.as_str()).await {
                        Ok((snapshot, fresh)) => {
                            events = BroadcastStream::new(fresh);
                            ServerEvent::SessionUpdated { snapshot }
                        }
                        Err(_) => ServerEvent::SessionClosed {
                            session_id: code.clone(),
                        },
                    }
                }
            };
            if !event
                .session_id()
                .is_some_and(|id| code.matches(id.as_str()))
            {
                continue;
            }
            let closed = matches!(event, ServerEvent::SessionClosed { .. });
            if send_event(&mut sender, &event).await.is_err() || closed {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(err) => {
            warn!(%err, "failed to encode server event");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}

#[cfg(test)]
#[path = "tests/routes_tests.rs"]
mod tests;
