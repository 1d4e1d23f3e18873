use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ConsoleId, QuestionDraft, SessionCode, SessionSnapshot},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        AdminLoginResponse, ConsoleState, CreatePresentationRequest, HistoryResponse,
        JoinRequest, JoinResponse, ServerEvent, VoteRequest, VoteResponse,
    },
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

pub mod chart;
pub mod config;
pub mod session;
pub mod suggest;

pub use chart::{chart_rows, ChartRow};
pub use config::ClientSettings;
pub use session::{AdminConsole, ParticipantSession, RemovedFromSession};
pub use suggest::{
    suggester_from_settings, GeminiSuggester, MissingSuggester, Suggester, SuggestionController,
    SuggestionError,
};

/// HTTP client for the poll server.
#[derive(Debug, Clone)]
pub struct PollClient {
    http: Client,
    server_url: String,
}

impl PollClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn admin_login(&self) -> Result<ConsoleId> {
        let res = self
            .http
            .post(format!("{}/admin/login", self.server_url))
            .send()
            .await
            .context("admin login request failed")?;
        let body: AdminLoginResponse = decode(res).await?;
        Ok(body.console_id)
    }

    pub async fn create_presentation(
        &self,
        console_id: &ConsoleId,
        title: &str,
        questions: Vec<QuestionDraft>,
    ) -> Result<ConsoleState> {
        let res = self
            .http
            .post(format!(
                "{}/admin/{console_id}/presentation",
                self.server_url
            ))
            .json(&CreatePresentationRequest {
                title: title.to_string(),
                questions,
            })
            .send()
            .await
            .context("create presentation request failed")?;
        decode(res).await
    }

    pub async fn start_presentation(&self, console_id: &ConsoleId) -> Result<ConsoleState> {
        self.admin_action(console_id, "start").await
    }

    pub async fn next_question(&self, console_id: &ConsoleId) -> Result<ConsoleState> {
        self.admin_action(console_id, "next").await
    }

    pub async fn previous_question(&self, console_id: &ConsoleId) -> Result<ConsoleState> {
        self.admin_action(console_id, "previous").await
    }

    pub async fn reset_presentation(&self, console_id: &ConsoleId) -> Result<ConsoleState> {
        self.admin_action(console_id, "reset").await
    }

    pub async fn start_new_presentation(&self, console_id: &ConsoleId) -> Result<ConsoleState> {
        self.admin_action(console_id, "start_new").await
    }

    pub async fn console_state(&self, console_id: &ConsoleId) -> Result<ConsoleState> {
        let res = self
            .http
            .get(format!("{}/admin/{console_id}/session", self.server_url))
            .send()
            .await
            .context("console state request failed")?;
        decode(res).await
    }

    pub async fn history(&self, console_id: &ConsoleId) -> Result<HistoryResponse> {
        let res = self
            .http
            .get(format!("{}/admin/{console_id}/history", self.server_url))
            .send()
            .await
            .context("history request failed")?;
        decode(res).await
    }

    /// Malformed codes fail with a `Validation` error without reaching the server.
    pub async fn join(&self, name: &str, session_id: &str) -> Result<JoinResponse> {
        let session_id = session_id.trim();
        if !engine::ids::is_valid_session_code(session_id) {
            return Err(ApiException::new(
                ErrorCode::Validation,
                "session codes are six letters or digits",
            )
            .into());
        }
        let res = self
            .http
            .post(format!("{}/sessions/join", self.server_url))
            .json(&JoinRequest {
                name: name.to_string(),
                session_id: SessionCode::normalized(session_id),
            })
            .send()
            .await
            .context("join request failed")?;
        decode(res).await
    }

    pub async fn vote(&self, session_id: &SessionCode, req: &VoteRequest) -> Result<VoteResponse> {
        let res = self
            .http
            .post(format!("{}/sessions/{session_id}/votes", self.server_url))
            .json(req)
            .send()
            .await
            .context("vote request failed")?;
        decode(res).await
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        let res = self
            .http
            .get(format!("{}/sessions/{session_id}", self.server_url))
            .send()
            .await
            .context("snapshot request failed")?;
        decode(res).await
    }

    /// Opens the push channel for one session.
    pub async fn subscribe(&self, session_id: &str) -> Result<EventSubscription> {
        let ws_url = self.ws_url(session_id)?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (_, mut ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let closed = matches!(event, ServerEvent::SessionClosed { .. });
                            if tx.send(event).await.is_err() || closed {
                                break;
                            }
                        }
                        Err(err) => warn!(%err, "ignoring undecodable server event"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        debug!(%err, "websocket reader stopped");
                        break;
                    }
                }
            }
        });

        Ok(EventSubscription { rx, task })
    }

    /// Push updates when the WebSocket is reachable, polling otherwise.
    pub async fn watch(&self, session_id: &str, poll_interval: Duration) -> SessionFeed {
        match self.subscribe(session_id).await {
            Ok(subscription) => SessionFeed::Push(subscription),
            Err(err) => {
                warn!(session_id, %err, "push channel unavailable, falling back to polling");
                SessionFeed::Poll(self.poll(session_id, poll_interval))
            }
        }
    }

    pub fn poll(&self, session_id: &str, interval: Duration) -> SnapshotPoller {
        SnapshotPoller {
            client: self.clone(),
            session_id: SessionCode::normalized(session_id),
            interval,
            started: false,
            last: None,
            done: false,
        }
    }

    fn ws_url(&self, session_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url: {}", self.server_url))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(anyhow!("unsupported server url scheme: {other}")),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive websocket url from {}", self.server_url))?;
        url.set_path("/ws");
        url.query_pairs_mut()
            .clear()
            .append_pair("session_id", &SessionCode::normalized(session_id));
        Ok(url)
    }

    async fn admin_action(&self, console_id: &ConsoleId, action: &str) -> Result<ConsoleState> {
        let res = self
            .http
            .post(format!("{}/admin/{console_id}/{action}", self.server_url))
            .send()
            .await
            .with_context(|| format!("admin {action} request failed"))?;
        decode(res).await
    }
}

/// Decodes a success body, or lifts the server's `ApiError` into an `ApiException`.
async fn decode<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if status.is_success() {
        return res.json().await.context("failed to decode server response");
    }
    let bytes = res.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<ApiError>(&bytes) {
        Ok(err) => Err(ApiException::from(err).into()),
        Err(_) => Err(anyhow!("server returned {status}")),
    }
}

/// The error code carried by a failed call, if the server supplied one.
pub fn api_error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<ApiException>().map(|e| e.code)
}

pub struct EventSubscription {
    rx: mpsc::Receiver<ServerEvent>,
    task: JoinHandle<()>,
}

impl EventSubscription {
    pub async fn next(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Periodic `GET /sessions/{code}`, yielding only snapshots that changed.
pub struct SnapshotPoller {
    client: PollClient,
    session_id: String,
    interval: Duration,
    started: bool,
    last: Option<SessionSnapshot>,
    done: bool,
}

impl SnapshotPoller {
    pub async fn next(&mut self) -> Option<ServerEvent> {
        loop {
            if self.done {
                return None;
            }
            if self.started {
                tokio::time::sleep(self.interval).await;
            }
            self.started = true;

            match self.client.snapshot(&self.session_id).await {
                Ok(snapshot) => {
                    if self.last.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    self.last = Some(snapshot.clone());
                    return Some(ServerEvent::SessionUpdated { snapshot });
                }
                Err(err) if api_error_code(&err) == Some(ErrorCode::NotFound) => {
                    self.done = true;
                    return Some(match self.last.take() {
                        Some(last) => ServerEvent::SessionClosed {
                            session_id: last.presentation.id,
                        },
                        None => ServerEvent::Error(ApiError::new(
                            ErrorCode::NotFound,
                            "invalid session id, please check and try again",
                        )),
                    });
                }
                Err(err) => {
                    warn!(session_id = %self.session_id, %err, "poll failed, retrying");
                }
            }
        }
    }
}

pub enum SessionFeed {
    Push(EventSubscription),
    Poll(SnapshotPoller),
}

impl SessionFeed {
    pub async fn next(&mut self) -> Option<ServerEvent> {
        match self {
            Self::Push(subscription) => subscription.next().await,
            Self::Poll(poller) => poller.next().await,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Self::Push(_))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
