//! Per-session identity: a client-generated id persisted in session-scoped storage.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

/// Key/value storage scoped to one session (a tab, a process, a user login).
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Session storage kept in memory; cleared with [`MemorySessionStorage::clear`].
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored value, ending the session.
    pub fn clear(&self) {
        self.values.lock().clear();
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

/// Resolves the session id shared by every record written in one session.
///
/// The first call generates `<base36 epoch millis><base36 random>` and stores
/// it under the configured key. Later calls return the stored value as long
/// as the storage keeps it. Uniqueness is probabilistic; no collision check.
#[derive(Clone)]
pub struct SessionIdentity {
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SessionIdentity {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Storage key the id lives under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current session id, generating and persisting one on first use.
    #[must_use]
    pub fn session_id(&self) -> String {
        if let Some(existing) = self.storage.get(&self.key) {
            return existing;
        }
        let id = generate_session_id();
        self.storage.set(&self.key, &id);
        tracing::debug!(session_id = %id, "new session started");
        id
    }
}

fn generate_session_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let suffix: u64 = rand::random();
    format!("{}{}", to_base36(millis), to_base36(suffix))
}

/// Lowercase base-36 rendering of `value`.
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}
