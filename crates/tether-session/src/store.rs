//! Key-value storage the registry reads identity and credentials from.
//!
//! Tether does not own credential persistence. The embedding application
//! implements [`CredentialStore`] over whatever it already has (a config
//! file, a keychain, browser local storage behind a bridge). The registry
//! re-reads both keys on every `acquire`, so a login or logout elsewhere is
//! picked up on the next request for a view.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key holding the serialized bearer-token record.
pub const TOKEN_KEY: &str = "token";

/// Key holding the signed-in user's id.
pub const USER_ID_KEY: &str = "userId";

/// Read access to persisted string values.
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory [`CredentialStore`] for tests and embedded use.
///
/// ```rust
/// use tether_session::{CredentialStore, MemoryStore, USER_ID_KEY};
///
/// let store = MemoryStore::new();
/// store.set(USER_ID_KEY, "17");
/// assert_eq!(store.get(USER_ID_KEY).as_deref(), Some("17"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl<S: CredentialStore> CredentialStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}
