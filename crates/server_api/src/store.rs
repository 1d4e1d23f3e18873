use std::{collections::HashMap, sync::Arc};

use engine::{ids, CodeAllocationError, SessionEngine};
use shared::domain::{ConsoleId, SessionCode};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Authoritative home of every live session.
///
/// One engine per admin console; participants reach an engine through the code index. The whole
/// state sits behind a single lock and each API call holds it for its full duration.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().await
    }
}

#[derive(Default)]
pub struct StoreState {
    consoles: HashMap<ConsoleId, SessionEngine>,
    live_codes: HashMap<String, ConsoleId>,
}

impl StoreState {
    pub fn open_console(&mut self) -> ConsoleId {
        let console_id = ConsoleId(format!("console-{}", Uuid::new_v4().simple()));
        self.consoles
            .insert(console_id.clone(), SessionEngine::new());
        console_id
    }

    pub fn console_count(&self) -> usize {
        self.consoles.len()
    }

    pub fn console(&self, console_id: &ConsoleId) -> Option<&SessionEngine> {
        self.consoles.get(console_id)
    }

    pub fn console_mut(&mut self, console_id: &ConsoleId) -> Option<&mut SessionEngine> {
        self.consoles.get_mut(console_id)
    }

    pub fn console_for_code(&self, code: &str) -> Option<&ConsoleId> {
        self.live_codes.get(&SessionCode::normalized(code))
    }

    pub fn engine_for_code_mut(&mut self, code: &str) -> Option<&mut SessionEngine> {
        let console_id = self.live_codes.get(&SessionCode::normalized(code))?;
        self.consoles.get_mut(console_id)
    }

    pub fn engine_for_code(&self, code: &str) -> Option<&SessionEngine> {
        let console_id = self.console_for_code(code)?;
        self.consoles.get(console_id)
    }

    pub fn allocate_code(&self) -> Result<SessionCode, CodeAllocationError> {
        ids::new_session_id_avoiding(|candidate| self.live_codes.contains_key(candidate.as_str()))
    }

    pub fn register_code(&mut self, code: &SessionCode, console_id: &ConsoleId) {
        self.live_codes
            .insert(SessionCode::normalized(code.as_str()), console_id.clone());
    }

    pub fn release_code(&mut self, code: &SessionCode) {
        self.live_codes
            .remove(&SessionCode::normalized(code.as_str()));
    }

    pub fn live_session_count(&self) -> usize {
        self.live_codes.len()
    }
}
