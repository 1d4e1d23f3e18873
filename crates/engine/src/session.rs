use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use shared::domain::{
    HistoryRecord, OptionId, Participant, ParticipantHandle, ParticipantId, ParticipantSummary,
    PollOption, Presentation, Question, QuestionDraft, QuestionId, SessionCode, SessionSnapshot,
    TallyTable, MAX_OPTIONS_PER_QUESTION, MIN_OPTIONS_PER_QUESTION,
};
use tracing::debug;

use crate::{
    archive::HistoryArchive,
    error::{InputError, JoinError, VoteError},
    ids,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Created,
    Live,
}

/// Owns one live presentation together with its tally, its roster and the archive of earlier
/// sessions.
#[derive(Debug, Default)]
pub struct SessionEngine {
    presentation: Option<Presentation>,
    votes: TallyTable,
    participants: HashMap<ParticipantId, Participant>,
    join_order: Vec<ParticipantId>,
    history: HistoryArchive,
}

pub fn validate_presentation(title: &str, questions: &[QuestionDraft]) -> Result<(), InputError> {
    if title.trim().is_empty() {
        return Err(InputError::EmptyTitle);
    }
    if questions.is_empty() {
        return Err(InputError::NoQuestions);
    }
    for (index, question) in questions.iter().enumerate() {
        if question.text.trim().is_empty() {
            return Err(InputError::EmptyQuestion { index });
        }
        let actual = question.options.len();
        if !(MIN_OPTIONS_PER_QUESTION..=MAX_OPTIONS_PER_QUESTION).contains(&actual) {
            return Err(InputError::OptionCount {
                index,
                actual,
                min: MIN_OPTIONS_PER_QUESTION,
                max: MAX_OPTIONS_PER_QUESTION,
            });
        }
        if let Some(option) = question
            .options
            .iter()
            .position(|option| option.trim().is_empty())
        {
            return Err(InputError::EmptyOption {
                question: index,
                option,
            });
        }
    }
    Ok(())
}

fn build_questions(drafts: &[QuestionDraft]) -> Vec<Question> {
    drafts
        .iter()
        .enumerate()
        .map(|(question_index, draft)| {
            let question_id = format!("q{}", question_index + 1);
            let options = draft
                .options
                .iter()
                .enumerate()
                .map(|(option_index, text)| PollOption {
                    id: OptionId(format!("{question_id}-o{}", option_index + 1)),
                    text: text.trim().to_string(),
                })
                .collect();
            Question {
                id: QuestionId(question_id),
                text: draft.text.trim().to_string(),
                options,
            }
        })
        .collect()
}

impl SessionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match &self.presentation {
            None => SessionState::NoSession,
            Some(presentation) if presentation.is_active => SessionState::Live,
            Some(_) => SessionState::Created,
        }
    }

    /// Replaces the current presentation, if any, without archiving it.
    pub fn create_presentation(
        &mut self,
        title: &str,
        questions: &[QuestionDraft],
    ) -> Result<&Presentation, InputError> {
        self.create_presentation_with_id(ids::new_session_id(), title, questions)
    }

    pub fn create_presentation_with_id(
        &mut self,
        id: SessionCode,
        title: &str,
        questions: &[QuestionDraft],
    ) -> Result<&Presentation, InputError> {
        validate_presentation(title, questions)?;

        let presentation = Presentation {
            id,
            title: title.trim().to_string(),
            questions: build_questions(questions),
            current_question_index: 0,
            is_active: false,
            created_at: Utc::now(),
        };
        debug!(
            session_id = %presentation.id,
            questions = presentation.questions.len(),
            "presentation created"
        );

        self.votes = TallyTable::zeroed_for(&presentation);
        self.participants.clear();
        self.join_order.clear();
        Ok(self.presentation.insert(presentation))
    }

    /// Returns `false` when there is no presentation to start.
    pub fn start_presentation(&mut self) -> bool {
        match self.presentation.as_mut() {
            Some(presentation) => {
                presentation.is_active = true;
                true
            }
            None => false,
        }
    }

    /// Returns whether the cursor moved.
    pub fn next_question(&mut self) -> bool {
        let Some(presentation) = self.presentation.as_mut() else {
            return false;
        };
        if presentation.current_question_index + 1 >= presentation.questions.len() {
            return false;
        }
        presentation.current_question_index += 1;
        true
    }

    /// Returns whether the cursor moved.
    pub fn previous_question(&mut self) -> bool {
        let Some(presentation) = self.presentation.as_mut() else {
            return false;
        };
        if presentation.current_question_index == 0 {
            return false;
        }
        presentation.current_question_index -= 1;
        true
    }

    /// Zeroes the tally and empties the roster. Questions, id, activity and cursor stay as is.
    pub fn reset_presentation(&mut self) -> bool {
        if self.presentation.is_none() {
            return false;
        }
        self.votes.reset();
        self.participants.clear();
        self.join_order.clear();
        true
    }

    /// Archives the current presentation with a copy of its tally, then clears it.
    pub fn start_new_presentation(&mut self) -> Option<&HistoryRecord> {
        let presentation = self.presentation.take()?;
        let votes = std::mem::take(&mut self.votes);
        self.participants.clear();
        self.join_order.clear();
        debug!(session_id = %presentation.id, "presentation archived");
        Some(self.history.append(HistoryRecord {
            presentation,
            votes,
            archived_at: Utc::now(),
        }))
    }

    pub fn join_presentation(
        &mut self,
        name: &str,
        session_id: &str,
    ) -> Result<ParticipantHandle, JoinError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InputError::EmptyName.into());
        }
        let Some(presentation) = &self.presentation else {
            return Err(JoinError::NoSuchSession);
        };
        if !presentation.id.matches(session_id) {
            return Err(JoinError::NoSuchSession);
        }

        let participant_id = ids::new_participant_id();
        self.participants
            .insert(participant_id.clone(), Participant::new(name));
        self.join_order.push(participant_id.clone());
        debug!(session_id = %presentation.id, %participant_id, "participant joined");

        Ok(ParticipantHandle {
            participant_id,
            name: name.to_string(),
        })
    }

    pub fn submit_vote(
        &mut self,
        participant_id: &ParticipantId,
        question_id: &QuestionId,
        option_id: &OptionId,
    ) -> Result<(), VoteError> {
        let participant = self
            .participants
            .get_mut(participant_id)
            .ok_or(VoteError::UnknownParticipant)?;
        if participant.has_voted(question_id) {
            return Err(VoteError::AlreadyVoted);
        }

        let target_exists = self
            .presentation
            .as_ref()
            .and_then(|presentation| presentation.question(question_id))
            .and_then(|question| question.option(option_id))
            .is_some();
        if !target_exists || !self.votes.increment(question_id, option_id) {
            return Err(VoteError::InvalidTarget);
        }
        participant.voted_on.insert(question_id.clone());
        Ok(())
    }

    pub fn presentation(&self) -> Option<&Presentation> {
        self.presentation.as_ref()
    }

    pub fn votes(&self) -> &TallyTable {
        &self.votes
    }

    pub fn history(&self) -> &HistoryArchive {
        &self.history
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.presentation.as_ref()?.current_question()
    }

    pub fn participant(&self, participant_id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(participant_id)
    }

    /// Roster in join order.
    pub fn participants(&self) -> impl Iterator<Item = (&ParticipantId, &Participant)> {
        self.join_order
            .iter()
            .filter_map(|id| self.participants.get_key_value(id))
    }

    pub fn has_voted(&self, participant_id: &ParticipantId, question_id: &QuestionId) -> bool {
        self.participants
            .get(participant_id)
            .is_some_and(|participant| participant.has_voted(question_id))
    }

    pub fn tally_for(&self, question_id: &QuestionId) -> Option<&BTreeMap<OptionId, u64>> {
        self.votes.for_question(question_id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn votes_completed_by(&self, participant_id: &ParticipantId) -> usize {
        self.participants
            .get(participant_id)
            .map(|participant| participant.voted_on.len())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let presentation = self.presentation.clone()?;
        let participants: Vec<ParticipantSummary> = self
            .participants()
            .map(|(_, participant)| ParticipantSummary {
                name: participant.name.clone(),
                voted_on: participant.voted_on.clone(),
            })
            .collect();
        Some(SessionSnapshot {
            presentation,
            votes: self.votes.clone(),
            participant_count: participants.len(),
            participants,
        })
    }
}
