//! State shared by every other store: the access token, the last server
//! error and whether the app finished loading.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ServerError;

#[derive(Debug, Default)]
struct CommonState {
    token: Option<String>,
    server_error: Option<ServerError>,
    app_loaded: bool,
}

/// Cloneable handle; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct CommonStore {
    state: Arc<Mutex<CommonState>>,
}

impl CommonStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CommonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        self.lock().token = token;
    }

    pub fn server_error(&self) -> Option<ServerError> {
        self.lock().server_error.clone()
    }

    pub fn set_server_error(&self, error: ServerError) {
        self.lock().server_error = Some(error);
    }

    pub fn app_loaded(&self) -> bool {
        self.lock().app_loaded
    }

    pub fn set_app_loaded(&self) {
        self.lock().app_loaded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_token() {
        let store = CommonStore::new();
        let handle = store.clone();

        handle.set_token(Some("jwt".to_string()));
        assert_eq!(store.token().as_deref(), Some("jwt"));

        store.set_token(None);
        assert_eq!(handle.token(), None);
    }

    #[test]
    fn app_starts_unloaded() {
        let store = CommonStore::new();
        assert!(!store.app_loaded());

        store.set_app_loaded();
        assert!(store.app_loaded());
    }
}
