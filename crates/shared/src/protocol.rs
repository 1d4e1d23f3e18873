use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        ConsoleId, HistoryRecord, OptionId, Participant, ParticipantHandle, ParticipantId,
        QuestionDraft, QuestionId, SessionCode, SessionSnapshot,
    },
    error::ApiError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginResponse {
    pub console_id: ConsoleId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePresentationRequest {
    pub title: String,
    pub questions: Vec<QuestionDraft>,
}

/// Admin view of the console: the live session (if any) and how many sessions were archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleState {
    pub console_id: ConsoleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSnapshot>,
    pub archived_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub records: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub participant: ParticipantHandle,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub participant_id: ParticipantId,
    pub question_id: QuestionId,
    pub option_id: OptionId,
}

/// `recorded` is `false` when the participant had already voted on the question; that case is
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub recorded: bool,
    pub participant: Participant,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedQuestion {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPresentation {
    pub title: String,
    pub questions: Vec<SuggestedQuestion>,
}

impl SuggestedPresentation {
    pub fn into_drafts(self) -> (String, Vec<QuestionDraft>) {
        let drafts = self
            .questions
            .into_iter()
            .map(|question| QuestionDraft {
                text: question.question,
                options: question.options,
            })
            .collect();
        (self.title, drafts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    SessionUpdated { snapshot: SessionSnapshot },
    SessionClosed { session_id: SessionCode },
    Error(ApiError),
}

impl ServerEvent {
    pub fn session_id(&self) -> Option<&SessionCode> {
        match self {
            Self::SessionUpdated { snapshot } => Some(snapshot.session_id()),
            Self::SessionClosed { session_id } => Some(session_id),
            Self::Error(_) => None,
        }
    }
}
