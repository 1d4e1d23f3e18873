//! Session state machine for live polls: presentation lifecycle, joins, idempotent voting and
//! the archive of finished sessions. Pure in-memory, callers provide synchronization.

mod archive;
mod error;
pub mod ids;
mod session;
pub mod view;

pub use archive::HistoryArchive;
pub use error::{CodeAllocationError, InputError, JoinError, VoteError};
pub use session::{validate_presentation, SessionEngine, SessionState};
pub use view::{
    resolve_participant_mode, Intent, SessionView, TransitionError, ViewController, ViewMode,
};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
