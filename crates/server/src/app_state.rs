use server_api::ApiContext;

/// Shared handler state. Event fan-out lives in the `ApiContext`, next to the store lock.
#[derive(Clone)]
pub struct AppState {
    pub(crate) api: ApiContext,
}

impl AppState {
    pub fn new(api: ApiContext) -> Self {
        Self { api }
    }
}
