//! The local settings port: read access plus change notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// The slice of the external settings store the gate cares about. The gate
/// only reads it; ownership stays with the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSettings {
    pub settings_password_enabled: bool,
    pub settings_passwords: Vec<String>,
}

impl LocalSettings {
    /// True when local settings alone require a password prompt.
    pub fn requires_password(&self) -> bool {
        self.settings_password_enabled && !self.settings_passwords.is_empty()
    }
}

/// Change listener registered through [`SettingsStore::subscribe`].
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Read + subscribe interface over the external settings store.
pub trait SettingsStore: Send + Sync {
    /// Current settings snapshot.
    fn get_settings(&self) -> LocalSettings;

    /// Register a change listener, fired on any settings mutation until the
    /// returned subscription is dropped.
    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Handle for an active settings subscription. Unsubscribes on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a store-specific unsubscribe function.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// In-memory settings store used by embeddings and tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<LocalSettings>,
    listeners: Arc<Mutex<Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
}

impl MemorySettingsStore {
    pub fn new(settings: LocalSettings) -> Self {
        MemorySettingsStore {
            settings: Mutex::new(settings),
            ..Default::default()
        }
    }

    /// Replace the stored settings and notify all subscribers.
    pub fn update(&self, settings: LocalSettings) {
        *self.settings.lock().expect("settings poisoned") = settings;

        // Snapshot the listeners so a callback can unsubscribe without
        // deadlocking on the listener list.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .expect("listener list poisoned")
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_settings(&self) -> LocalSettings {
        self.settings.lock().expect("settings poisoned").clone()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listener list poisoned")
            .push((id, listener));

        let listeners: Weak<Mutex<Vec<(u64, Listener)>>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .expect("listener list poisoned")
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn passwords(enabled: bool, list: &[&str]) -> LocalSettings {
        LocalSettings {
            settings_password_enabled: enabled,
            settings_passwords: list.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn requires_password_needs_both_flag_and_entries() {
        assert!(passwords(true, &["pw"]).requires_password());
        assert!(!passwords(false, &["pw"]).requires_password());
        assert!(!passwords(true, &[]).requires_password());
        assert!(!LocalSettings::default().requires_password());
    }

    #[test]
    fn update_notifies_subscribers() {
        let store = MemorySettingsStore::default();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_listener = fired.clone();
        let subscription = store.subscribe(Arc::new(move || {
            fired_in_listener.fetch_add(1, Ordering::SeqCst);
        }));

        store.update(passwords(true, &["pw"]));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_settings(), passwords(true, &["pw"]));

        drop(subscription);
        store.update(LocalSettings::default());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
