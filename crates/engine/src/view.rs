//! Screen selection for admin and participant front-ends.
//!
//! Rendering lives elsewhere; this module only decides which screen is shown and which user
//! intents are valid from it. Mode resolution is pure and never mutates session state.

use shared::domain::{Participant, Presentation, Question};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    Home,
    AdminLogin,
    AdminDashboard,
    AdminPastSessions,
    ParticipantJoin,
    ParticipantVote,
    /// The session exists but has not been started.
    ParticipantWaiting,
    /// Voted on the current question, waiting for the presenter to move on.
    ParticipantVoted,
}

impl ViewMode {
    pub fn is_participant_session(self) -> bool {
        matches!(
            self,
            Self::ParticipantVote | Self::ParticipantWaiting | Self::ParticipantVoted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    OpenAdminLogin,
    OpenParticipantJoin,
    LoginSucceeded,
    OpenPastSessions,
    CloseHistory,
    GoHome,
    JoinSucceeded,
    /// A vote round-trip finished, whether it was recorded or ignored as a duplicate.
    VoteSettled,
    SessionUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{intent:?} is not available from {from:?}")]
pub struct TransitionError {
    pub from: ViewMode,
    pub intent: Intent,
}

pub fn resolve_participant_mode(
    presentation: Option<&Presentation>,
    participant: Option<&Participant>,
    current_question: Option<&Question>,
) -> ViewMode {
    let Some(presentation) = presentation else {
        return ViewMode::ParticipantWaiting;
    };
    if !presentation.is_active {
        return ViewMode::ParticipantWaiting;
    }
    let voted = match (participant, current_question) {
        (Some(participant), Some(question)) => participant.has_voted(&question.id),
        _ => false,
    };
    if voted {
        ViewMode::ParticipantVoted
    } else {
        ViewMode::ParticipantVote
    }
}

/// What the participant screens need to know to pick a mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionView<'a> {
    pub presentation: Option<&'a Presentation>,
    pub participant: Option<&'a Participant>,
}

impl SessionView<'_> {
    fn resolve(&self) -> ViewMode {
        resolve_participant_mode(
            self.presentation,
            self.participant,
            self.presentation.and_then(Presentation::current_question),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ViewController {
    mode: ViewMode,
}

impl Default for ViewController {
    fn default() -> Self {
        Self {
            mode: ViewMode::Home,
        }
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn apply(
        &mut self,
        intent: Intent,
        session: SessionView<'_>,
    ) -> Result<ViewMode, TransitionError> {
        use ViewMode::*;

        let next = match (self.mode, intent) {
            (Home, Intent::OpenAdminLogin) => AdminLogin,
            (Home, Intent::OpenParticipantJoin) => ParticipantJoin,
            (AdminLogin, Intent::LoginSucceeded) => AdminDashboard,
            (AdminDashboard, Intent::OpenPastSessions) => AdminPastSessions,
            (AdminPastSessions, Intent::CloseHistory) => AdminDashboard,
            (_, Intent::GoHome) => Home,
            (ParticipantJoin, Intent::JoinSucceeded) => session.resolve(),
            (mode, Intent::VoteSettled) if mode.is_participant_session() => session.resolve(),
            (mode, Intent::SessionUpdated) if mode.is_participant_session() => session.resolve(),
            (mode, Intent::SessionUpdated) => mode,
            (from, intent) => return Err(TransitionError { from, intent }),
        };
        self.mode = next;
        Ok(next)
    }
}
