use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("a presentation needs at least one question")]
    NoQuestions,
    #[error("question {index} must have text")]
    EmptyQuestion { index: usize },
    #[error("question {index} must have between {min} and {max} options, got {actual}")]
    OptionCount {
        index: usize,
        actual: usize,
        min: usize,
        max: usize,
    },
    #[error("option {option} of question {question} must have text")]
    EmptyOption { question: usize, option: usize },
    #[error("participant name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// Covers both "no live session" and "wrong code" so callers cannot probe for valid codes.
    #[error("no session matches that code")]
    NoSuchSession,
    #[error(transparent)]
    InvalidInput(#[from] InputError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("participant is not part of this session")]
    UnknownParticipant,
    #[error("participant already voted on this question")]
    AlreadyVoted,
    #[error("question or option does not belong to this session")]
    InvalidTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not allocate a free session code after {attempts} attempts")]
pub struct CodeAllocationError {
    pub attempts: usize,
}
