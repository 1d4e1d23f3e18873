use anyhow::{anyhow, Result};
use thiserror::Error;
use engine::{Intent, SessionView, ViewController, ViewMode};
use shared::{
    domain::{
        ConsoleId, HistoryRecord, OptionId, Participant, ParticipantHandle, Question, QuestionDraft,
        SessionCode, SessionSnapshot,
    },
    error::ErrorCode,
    protocol::{ConsoleState, ServerEvent, SuggestedPresentation, VoteRequest},
};
use tracing::{debug, info, warn};

use crate::{api_error_code, chart_rows, ChartRow, PollClient};

/// The server no longer knows this participant, typically after the admin reset the session.
#[derive(Debug, Error)]
#[error("you were removed from session {0}; join again to keep voting")]
pub struct RemovedFromSession(pub SessionCode);

/// A participant's side of a live session: local roster entry, last snapshot and screen mode.
pub struct ParticipantSession {
    client: PollClient,
    handle: ParticipantHandle,
    participant: Participant,
    snapshot: Option<SessionSnapshot>,
    session_id: SessionCode,
    view: ViewController,
}

impl ParticipantSession {
    pub async fn join(client: PollClient, name: &str, session_id: &str) -> Result<Self> {
        let mut view = ViewController::new();
        view.apply(Intent::OpenParticipantJoin, SessionView::default())?;

        let joined = client.join(name, session_id).await?;
        let participant = Participant::new(joined.participant.name.clone());
        let session_id = joined.snapshot.presentation.id.clone();
        let mut session = Self {
            client,
            handle: joined.participant,
            participant,
            snapshot: Some(joined.snapshot),
            session_id,
            view,
        };
        session.transition(Intent::JoinSucceeded)?;
        info!(
            session_id = %session.session_id,
            participant_id = %session.handle.participant_id,
            mode = ?session.mode(),
            "joined session"
        );
        Ok(session)
    }

    pub fn mode(&self) -> ViewMode {
        self.view.mode()
    }

    pub fn handle(&self) -> &ParticipantHandle {
        &self.handle
    }

    pub fn session_id(&self) -> &SessionCode {
        &self.session_id
    }

    /// `None` once the session has been closed by its admin.
    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.presentation.current_question())
    }

    pub fn has_voted_current(&self) -> bool {
        self.current_question()
            .is_some_and(|question| self.participant.has_voted(&question.id))
    }

    /// Votes on the question currently on screen; returns whether the vote counted.
    ///
    /// Fails with [`RemovedFromSession`] and leaves the session when the server has dropped
    /// this participant.
    pub async fn vote(&mut self, option_id: &OptionId) -> Result<bool> {
        let question_id = self
            .current_question()
            .map(|question| question.id.clone())
            .ok_or_else(|| anyhow!("no question is open for voting"))?;
        let res = self
            .client
            .vote(
                &self.session_id,
                &VoteRequest {
                    participant_id: self.handle.participant_id.clone(),
                    question_id,
                    option_id: option_id.clone(),
                },
            )
            .await;
        let res = match res {
            Ok(res) => res,
            Err(err) if api_error_code(&err) == Some(ErrorCode::Forbidden) => {
                warn!(
                    session_id = %self.session_id,
                    participant_id = %self.handle.participant_id,
                    "participant no longer in session"
                );
                self.leave();
                return Err(RemovedFromSession(self.session_id.clone()).into());
            }
            Err(err) => return Err(err),
        };
        if !res.recorded {
            debug!(session_id = %self.session_id, "vote was already recorded");
        }
        self.participant = res.participant;
        self.snapshot = Some(res.snapshot);
        self.transition(Intent::VoteSettled)?;
        Ok(res.recorded)
    }

    /// Folds a pushed or polled event in; returns the resulting mode when it concerned us.
    pub fn apply_event(&mut self, event: &ServerEvent) -> Result<Option<ViewMode>> {
        if !event
            .session_id()
            .is_some_and(|id| self.session_id.matches(id.as_str()))
        {
            return Ok(None);
        }
        match event {
            ServerEvent::SessionUpdated { snapshot } => self.snapshot = Some(snapshot.clone()),
            ServerEvent::SessionClosed { .. } => self.snapshot = None,
            ServerEvent::Error(_) => return Ok(None),
        }
        self.transition(Intent::SessionUpdated).map(Some)
    }

    /// Re-reads the snapshot over HTTP.
    pub async fn refresh(&mut self) -> Result<ViewMode> {
        let snapshot = self.client.snapshot(self.session_id.as_str()).await?;
        self.snapshot = Some(snapshot);
        self.transition(Intent::SessionUpdated)
    }

    pub fn leave(&mut self) -> ViewMode {
        self.snapshot = None;
        self.transition(Intent::GoHome).unwrap_or(ViewMode::Home)
    }

    fn transition(&mut self, intent: Intent) -> Result<ViewMode> {
        let view = SessionView {
            presentation: self.snapshot.as_ref().map(|snapshot| &snapshot.presentation),
            participant: Some(&self.participant),
        };
        Ok(self.view.apply(intent, view)?)
    }
}

/// The admin's console: its id, the latest state the server reported and the screen mode.
pub struct AdminConsole {
    client: PollClient,
    console_id: ConsoleId,
    state: ConsoleState,
    view: ViewController,
}

impl AdminConsole {
    pub async fn login(client: PollClient) -> Result<Self> {
        let mut view = ViewController::new();
        view.apply(Intent::OpenAdminLogin, SessionView::default())?;
        let console_id = client.admin_login().await?;
        view.apply(Intent::LoginSucceeded, SessionView::default())?;
        let state = ConsoleState {
            console_id: console_id.clone(),
            session: None,
            archived_count: 0,
        };
        Ok(Self {
            client,
            console_id,
            state,
            view,
        })
    }

    /// Reattaches to an existing console.
    pub async fn resume(client: PollClient, console_id: ConsoleId) -> Result<Self> {
        let state = client.console_state(&console_id).await?;
        let mut view = ViewController::new();
        view.apply(Intent::OpenAdminLogin, SessionView::default())?;
        view.apply(Intent::LoginSucceeded, SessionView::default())?;
        Ok(Self {
            client,
            console_id,
            state,
            view,
        })
    }

    pub fn console_id(&self) -> &ConsoleId {
        &self.console_id
    }

    pub fn mode(&self) -> ViewMode {
        self.view.mode()
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn session(&self) -> Option<&SessionSnapshot> {
        self.state.session.as_ref()
    }

    pub async fn create(&mut self, title: &str, questions: Vec<QuestionDraft>) -> Result<()> {
        let state = self
            .client
            .create_presentation(&self.console_id, title, questions)
            .await?;
        self.update(state);
        Ok(())
    }

    pub async fn create_from_suggestion(
        &mut self,
        suggestion: SuggestedPresentation,
    ) -> Result<()> {
        let (title, questions) = suggestion.into_drafts();
        self.create(&title, questions).await
    }

    pub async fn start(&mut self) -> Result<()> {
        let state = self.client.start_presentation(&self.console_id).await?;
        self.update(state);
        Ok(())
    }

    pub async fn next(&mut self) -> Result<()> {
        let state = self.client.next_question(&self.console_id).await?;
        self.update(state);
        Ok(())
    }

    pub async fn previous(&mut self) -> Result<()> {
        let state = self.client.previous_question(&self.console_id).await?;
        self.update(state);
        Ok(())
    }

    pub async fn reset(&mut self) -> Result<()> {
        let state = self.client.reset_presentation(&self.console_id).await?;
        self.update(state);
        Ok(())
    }

    /// Archives the current session and clears the dashboard.
    pub async fn start_new(&mut self) -> Result<()> {
        let state = self.client.start_new_presentation(&self.console_id).await?;
        self.update(state);
        Ok(())
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let state = self.client.console_state(&self.console_id).await?;
        self.update(state);
        Ok(())
    }

    pub async fn open_history(&mut self) -> Result<Vec<HistoryRecord>> {
        self.view
            .apply(Intent::OpenPastSessions, SessionView::default())?;
        match self.client.history(&self.console_id).await {
            Ok(history) => Ok(history.records),
            Err(err) => {
                self.view.apply(Intent::CloseHistory, SessionView::default())?;
                Err(err)
            }
        }
    }

    pub fn close_history(&mut self) -> Result<ViewMode> {
        Ok(self
            .view
            .apply(Intent::CloseHistory, SessionView::default())?)
    }

    pub fn logout(&mut self) -> ViewMode {
        self.view
            .apply(Intent::GoHome, SessionView::default())
            .unwrap_or(ViewMode::Home)
    }

    pub fn apply_event(&mut self, event: &ServerEvent) -> bool {
        let Some(current) = self.state.session.as_ref() else {
            return false;
        };
        match event {
            ServerEvent::SessionUpdated { snapshot }
                if current.presentation.id == snapshot.presentation.id =>
            {
                self.state.session = Some(snapshot.clone());
                true
            }
            _ => false,
        }
    }

    /// Chart rows for the question on screen.
    pub fn current_chart(&self) -> Option<(Question, Vec<ChartRow>)> {
        let session = self.state.session.as_ref()?;
        let question = session.presentation.current_question()?;
        Some((question.clone(), chart_rows(question, &session.votes)))
    }

    fn update(&mut self, state: ConsoleState) {
        self.state = state;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
