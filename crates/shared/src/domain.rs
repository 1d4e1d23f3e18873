use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(SessionCode);
id_newtype!(QuestionId);
id_newtype!(OptionId);
id_newtype!(ParticipantId);
id_newtype!(ConsoleId);

impl SessionCode {
    /// Session codes are typed by humans, so comparison ignores letter case.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate)
    }

    pub fn normalized(candidate: &str) -> String {
        candidate.to_ascii_uppercase()
    }
}

pub const MIN_OPTIONS_PER_QUESTION: usize = 2;
pub const MAX_OPTIONS_PER_QUESTION: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<PollOption>,
}

impl Question {
    pub fn option(&self, option_id: &OptionId) -> Option<&PollOption> {
        self.options.iter().find(|option| &option.id == option_id)
    }
}

/// One poll event: an ordered set of questions moving from draft to live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub id: SessionCode,
    pub title: String,
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Presentation {
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn question(&self, question_id: &QuestionId) -> Option<&Question> {
        self.questions
            .iter()
            .find(|question| &question.id == question_id)
    }
}

/// Creation-time input for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<String>,
}

impl QuestionDraft {
    pub fn new(text: impl Into<String>, options: &[&str]) -> Self {
        Self {
            text: text.into(),
            options: options.iter().map(|option| option.to_string()).collect(),
        }
    }
}

/// Vote counts per option per question.
///
/// Every option of every question has an entry from creation onwards. Counts only grow until the
/// whole table is reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TallyTable(pub BTreeMap<QuestionId, BTreeMap<OptionId, u64>>);

impl TallyTable {
    pub fn zeroed_for(presentation: &Presentation) -> Self {
        let table = presentation
            .questions
            .iter()
            .map(|question| {
                let counts = question
                    .options
                    .iter()
                    .map(|option| (option.id.clone(), 0))
                    .collect();
                (question.id.clone(), counts)
            })
            .collect();
        Self(table)
    }

    pub fn for_question(&self, question_id: &QuestionId) -> Option<&BTreeMap<OptionId, u64>> {
        self.0.get(question_id)
    }

    pub fn count(&self, question_id: &QuestionId, option_id: &OptionId) -> u64 {
        self.0
            .get(question_id)
            .and_then(|counts| counts.get(option_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_for(&self, question_id: &QuestionId) -> u64 {
        self.0
            .get(question_id)
            .map(|counts| counts.values().sum())
            .unwrap_or_default()
    }

    /// Returns `false` when the question/option pair has no entry.
    pub fn increment(&mut self, question_id: &QuestionId, option_id: &OptionId) -> bool {
        match self
            .0
            .get_mut(question_id)
            .and_then(|counts| counts.get_mut(option_id))
        {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        for counts in self.0.values_mut() {
            for count in counts.values_mut() {
                *count = 0;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub voted_on: BTreeSet<QuestionId>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voted_on: BTreeSet::new(),
        }
    }

    pub fn has_voted(&self, question_id: &QuestionId) -> bool {
        self.voted_on.contains(question_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantHandle {
    pub participant_id: ParticipantId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub presentation: Presentation,
    pub votes: TallyTable,
    pub archived_at: DateTime<Utc>,
}

/// Roster entry as seen by other clients; participant ids stay private to their owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub name: String,
    pub voted_on: BTreeSet<QuestionId>,
}

/// Read model of one live session, pushed to subscribers after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub presentation: Presentation,
    pub votes: TallyTable,
    pub participants: Vec<ParticipantSummary>,
    pub participant_count: usize,
}

impl SessionSnapshot {
    pub fn session_id(&self) -> &SessionCode {
        &self.presentation.id
    }
}
