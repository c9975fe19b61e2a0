//! API key selection.
//!
//! The key is held in a shared store rather than baked into the provider, so
//! a key selected mid-session (the studio's `/key` command) is picked up by
//! the next request without rebuilding anything.

use std::sync::{Arc, PoisonError, RwLock};

/// Environment variables checked for a key, in order.
pub const API_KEY_ENV_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Shared, swappable API key.
#[derive(Clone, Default)]
pub struct ApiKeyStore {
    key: Arc<RwLock<Option<String>>>,
}

impl ApiKeyStore {
    /// Creates an empty store with no key selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given key already selected.
    pub fn with_key(key: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(key);
        store
    }

    /// Creates a store seeded from the first non-empty key variable.
    pub fn from_env() -> Self {
        Self::from_env_with(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `env`.
    pub fn from_env_with(env: impl Fn(&str) -> Option<String>) -> Self {
        let store = Self::new();
        if let Some((var, key)) = API_KEY_ENV_VARS.iter().find_map(|var| {
            env(*var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|key| (*var, key))
        }) {
            tracing::debug!(env_var = var, "using API key from environment");
            store.set(key);
        }
        store
    }

    /// Returns the selected key, if any.
    pub fn get(&self) -> Option<String> {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Selects a key. Blank input clears the selection.
    pub fn set(&self, key: impl Into<String>) {
        let key = key.into();
        let key = key.trim();
        let mut slot = self.key.write().unwrap_or_else(PoisonError::into_inner);
        *slot = (!key.is_empty()).then(|| key.to_string());
    }

    /// Forgets the selected key.
    pub fn clear(&self) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns true if a key has been selected.
    pub fn has_selected_api_key(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.has_selected_api_key() {
            "[REDACTED]"
        } else {
            "<none>"
        };
        f.debug_struct("ApiKeyStore").field("key", &state).finish()
    }
}
