use std::fmt::Display;

use engine::{validate_presentation, JoinError, SessionEngine, VoteError};
use shared::{
    domain::{ConsoleId, SessionCode, SessionSnapshot},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminLoginResponse, ConsoleState, CreatePresentationRequest, HistoryResponse,
        JoinRequest, JoinResponse, ServerEvent, VoteRequest, VoteResponse,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, info};

mod store;

pub use store::{SessionStore, StoreState};

pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Store plus the event fan-out. Events are sent while the store lock is held, so subscribers
/// see them in the order the store applied the mutations.
#[derive(Clone)]
pub struct ApiContext {
    pub store: SessionStore,
    events: broadcast::Sender<ServerEvent>,
}

impl ApiContext {
    pub fn new() -> Self {
        Self::with_event_buffer(DEFAULT_EVENT_BUFFER)
    }

    pub fn with_event_buffer(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer);
        Self {
            store: SessionStore::new(),
            events,
        }
    }

    // Callers hold the store guard.
    fn publish(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    fn publish_snapshot(&self, snapshot: Option<SessionSnapshot>) {
        if let Some(snapshot) = snapshot {
            self.publish(ServerEvent::SessionUpdated { snapshot });
        }
    }
}

impl Default for ApiContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of creating a presentation; `replaced` is the code of the discarded session, if any.
#[derive(Debug, Clone)]
pub struct PresentationCreated {
    pub state: ConsoleState,
    pub replaced: Option<SessionCode>,
}

#[derive(Debug, Clone)]
pub struct PresentationArchived {
    pub state: ConsoleState,
    pub archived: Option<SessionCode>,
}

/// Placeholder gate: every login succeeds and gets a fresh console.
pub async fn admin_login(ctx: &ApiContext) -> AdminLoginResponse {
    let mut store = ctx.store.lock().await;
    let console_id = store.open_console();
    info!(%console_id, consoles = store.console_count(), "admin console opened");
    AdminLoginResponse { console_id }
}

pub async fn create_presentation(
    ctx: &ApiContext,
    console_id: &ConsoleId,
    req: CreatePresentationRequest,
) -> Result<PresentationCreated, ApiError> {
    validate_presentation(&req.title, &req.questions).map_err(validation)?;

    let mut store = ctx.store.lock().await;
    if store.console(console_id).is_none() {
        return Err(unknown_console());
    }
    let code = store.allocate_code().map_err(internal)?;
    let engine = store.console_mut(console_id).ok_or_else(unknown_console)?;
    let replaced = engine.presentation().map(|presentation| presentation.id.clone());
    engine
        .create_presentation_with_id(code.clone(), &req.title, &req.questions)
        .map_err(validation)?;
    let state = state_of(console_id, engine);
    let snapshot = state.session.clone();

    if let Some(old_code) = &replaced {
        store.release_code(old_code);
        ctx.publish(ServerEvent::SessionClosed {
            session_id: old_code.clone(),
        });
    }
    store.register_code(&code, console_id);
    ctx.publish_snapshot(snapshot);
    info!(
        %console_id,
        session_id = %code,
        questions = req.questions.len(),
        "presentation created"
    );

    Ok(PresentationCreated { state, replaced })
}

pub async fn start_presentation(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<ConsoleState, ApiError> {
    let (started, state) =
        with_console(ctx, console_id, SessionEngine::start_presentation).await?;
    if started {
        info!(%console_id, "presentation started");
    }
    Ok(state)
}

pub async fn next_question(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<ConsoleState, ApiError> {
    let (_, state) = with_console(ctx, console_id, SessionEngine::next_question).await?;
    Ok(state)
}

pub async fn previous_question(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<ConsoleState, ApiError> {
    let (_, state) = with_console(ctx, console_id, SessionEngine::previous_question).await?;
    Ok(state)
}

pub async fn reset_presentation(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<ConsoleState, ApiError> {
    let (reset, state) =
        with_console(ctx, console_id, SessionEngine::reset_presentation).await?;
    if reset {
        info!(%console_id, "presentation reset");
    }
    Ok(state)
}

pub async fn start_new_presentation(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<PresentationArchived, ApiError> {
    let mut store = ctx.store.lock().await;
    let engine = store.console_mut(console_id).ok_or_else(unknown_console)?;
    let archived = engine
        .start_new_presentation()
        .map(|record| record.presentation.id.clone());
    let state = state_of(console_id, engine);

    if let Some(code) = &archived {
        store.release_code(code);
        ctx.publish(ServerEvent::SessionClosed {
            session_id: code.clone(),
        });
        info!(%console_id, session_id = %code, "presentation archived");
    }
    Ok(PresentationArchived { state, archived })
}

pub async fn console_state(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<ConsoleState, ApiError> {
    let store = ctx.store.lock().await;
    let engine = store.console(console_id).ok_or_else(unknown_console)?;
    Ok(state_of(console_id, engine))
}

pub async fn history(
    ctx: &ApiContext,
    console_id: &ConsoleId,
) -> Result<HistoryResponse, ApiError> {
    let store = ctx.store.lock().await;
    let engine = store.console(console_id).ok_or_else(unknown_console)?;
    Ok(HistoryResponse {
        records: engine.history().list().to_vec(),
    })
}

pub async fn join_presentation(
    ctx: &ApiContext,
    req: JoinRequest,
) -> Result<JoinResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "participant name must not be empty",
        ));
    }

    let mut store = ctx.store.lock().await;
    let engine = store
        .engine_for_code_mut(&req.session_id)
        .ok_or_else(no_such_session)?;
    let participant = engine
        .join_presentation(&req.name, &req.session_id)
        .map_err(join_error)?;
    let snapshot = engine.snapshot().ok_or_else(no_such_session)?;
    ctx.publish_snapshot(Some(snapshot.clone()));
    info!(
        session_id = %snapshot.session_id(),
        participant_id = %participant.participant_id,
        participants = snapshot.participant_count,
        "participant joined"
    );

    Ok(JoinResponse {
        participant,
        snapshot,
    })
}

pub async fn submit_vote(
    ctx: &ApiContext,
    session_id: &str,
    req: VoteRequest,
) -> Result<VoteResponse, ApiError> {
    let mut store = ctx.store.lock().await;
    let engine = store
        .engine_for_code_mut(session_id)
        .ok_or_else(no_such_session)?;

    let recorded = match engine.submit_vote(&req.participant_id, &req.question_id, &req.option_id)
    {
        Ok(()) => true,
        Err(VoteError::AlreadyVoted) => {
            debug!(
                session_id,
                participant_id = %req.participant_id,
                question_id = %req.question_id,
                "duplicate vote ignored"
            );
            false
        }
        Err(err) => return Err(vote_error(err)),
    };

    let participant = engine
        .participant(&req.participant_id)
        .cloned()
        .ok_or_else(|| vote_error(VoteError::UnknownParticipant))?;
    let snapshot = engine.snapshot().ok_or_else(no_such_session)?;
    if recorded {
        ctx.publish_snapshot(Some(snapshot.clone()));
    }

    Ok(VoteResponse {
        recorded,
        participant,
        snapshot,
    })
}

pub async fn session_snapshot(
    ctx: &ApiContext,
    session_id: &str,
) -> Result<SessionSnapshot, ApiError> {
    let store = ctx.store.lock().await;
    store
        .engine_for_code(session_id)
        .and_then(SessionEngine::snapshot)
        .ok_or_else(no_such_session)
}

/// Current snapshot plus a receiver positioned right after it: every event the receiver yields
/// was applied after the snapshot was taken.
pub async fn subscribe(
    ctx: &ApiContext,
    session_id: &str,
) -> Result<(SessionSnapshot, broadcast::Receiver<ServerEvent>), ApiError> {
    let store = ctx.store.lock().await;
    let snapshot = store
        .engine_for_code(session_id)
        .and_then(SessionEngine::snapshot)
        .ok_or_else(no_such_session)?;
    Ok((snapshot, ctx.events.subscribe()))
}

async fn with_console<T>(
    ctx: &ApiContext,
    console_id: &ConsoleId,
    op: impl FnOnce(&mut SessionEngine) -> T,
) -> Result<(T, ConsoleState), ApiError> {
    let mut store = ctx.store.lock().await;
    let engine = store.console_mut(console_id).ok_or_else(unknown_console)?;
    let outcome = op(&mut *engine);
    let state = state_of(console_id, engine);
    ctx.publish_snapshot(state.session.clone());
    Ok((outcome, state))
}

fn state_of(console_id: &ConsoleId, engine: &SessionEngine) -> ConsoleState {
    ConsoleState {
        console_id: console_id.clone(),
        session: engine.snapshot(),
        archived_count: engine.history().count(),
    }
}

fn no_such_session() -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        "invalid session id, please check and try again",
    )
}

fn unknown_console() -> ApiError {
    ApiError::new(
        ErrorCode::Unauthorized,
        "unknown admin console, log in again",
    )
}

fn join_error(err: JoinError) -> ApiError {
    match err {
        JoinError::NoSuchSession => no_such_session(),
        JoinError::InvalidInput(err) => validation(err),
    }
}

fn vote_error(err: VoteError) -> ApiError {
    let code = match err {
        VoteError::UnknownParticipant => ErrorCode::Forbidden,
        VoteError::AlreadyVoted | VoteError::InvalidTarget => ErrorCode::Validation,
    };
    ApiError::new(code, err.to_string())
}

fn validation(err: impl Display) -> ApiError {
    ApiError::new(ErrorCode::Validation, err.to_string())
}

fn internal(err: impl Display) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
