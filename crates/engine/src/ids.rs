use shared::domain::{ParticipantId, SessionCode};
use uuid::Uuid;

use crate::error::CodeAllocationError;

pub const SESSION_CODE_LEN: usize = 6;
const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 64;

/// Random six character code, uppercase alphanumeric. Not checked against live sessions.
pub fn new_session_id() -> SessionCode {
    // The first six bytes of a v4 UUID carry no version/variant bits.
    let entropy = Uuid::new_v4().into_bytes();
    let code = entropy
        .iter()
        .take(SESSION_CODE_LEN)
        .map(|byte| SESSION_CODE_ALPHABET[*byte as usize % SESSION_CODE_ALPHABET.len()] as char)
        .collect();
    SessionCode(code)
}

/// Draws codes until `is_taken` rejects none of them, for stores hosting several sessions.
pub fn new_session_id_avoiding(
    is_taken: impl Fn(&SessionCode) -> bool,
) -> Result<SessionCode, CodeAllocationError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = new_session_id();
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(CodeAllocationError {
        attempts: MAX_CODE_ATTEMPTS,
    })
}

pub fn new_participant_id() -> ParticipantId {
    ParticipantId(format!("user-{}", Uuid::new_v4().simple()))
}

pub fn is_valid_session_code(candidate: &str) -> bool {
    candidate.len() == SESSION_CODE_LEN
        && candidate
            .bytes()
            .all(|byte| SESSION_CODE_ALPHABET.contains(&byte.to_ascii_uppercase()))
}
