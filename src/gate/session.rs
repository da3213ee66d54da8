//! The per-session unlock flag, behind a port so embeddings can back it
//! with whatever session storage the host provides.

use std::collections::HashMap;
use std::sync::Mutex;

/// Storage key marking a successful unlock for the current session.
pub const SESSION_KEY: &str = "kvideo-settings-unlocked";

/// Session-scoped unlock state. The flag is created on successful unlock
/// and cleared when the session ends; the gate never clears it itself.
pub trait SessionStore: Send + Sync {
    fn is_unlocked(&self) -> bool;
    fn set_unlocked(&self);
    fn clear(&self);
}

/// In-memory session store holding plain string values per key, mirroring
/// browser session-storage semantics: only the literal "true" under
/// [`SESSION_KEY`] counts as unlocked.
#[derive(Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Set an arbitrary value under the session key, for callers that need
    /// to reproduce stale or foreign storage contents.
    pub fn set_raw(&self, value: &str) {
        self.values
            .lock()
            .expect("session storage poisoned")
            .insert(SESSION_KEY.to_string(), value.to_string());
    }
}

impl SessionStore for MemorySessionStore {
    fn is_unlocked(&self) -> bool {
        self.values
            .lock()
            .expect("session storage poisoned")
            .get(SESSION_KEY)
            .map(String::as_str)
            == Some("true")
    }

    fn set_unlocked(&self) {
        self.set_raw("true");
    }

    fn clear(&self) {
        self.values
            .lock()
            .expect("session storage poisoned")
            .remove(SESSION_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_literal_true_counts_as_unlocked() {
        let session = MemorySessionStore::default();
        assert!(!session.is_unlocked());

        session.set_raw("yes");
        assert!(!session.is_unlocked());

        session.set_unlocked();
        assert!(session.is_unlocked());

        session.clear();
        assert!(!session.is_unlocked());
    }
}
