//! The settings gate: decides whether protected settings content may render.
//!
//! The gate combines three signals behind explicit ports so embeddings and
//! tests can substitute implementations: local settings (read + subscribe),
//! the per-session unlock flag, and the remote config endpoint. Content is
//! locked when either the local settings or the server report a settings
//! password and the current session holds no unlock flag.

mod client;
mod session;
mod settings_store;

pub use client::{ConfigApi, HttpConfigClient, Scope};
pub use session::{MemorySessionStore, SessionStore, SESSION_KEY};
pub use settings_store::{
    Listener, LocalSettings, MemorySettingsStore, SettingsStore, Subscription,
};

use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error};

/// Lifecycle state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    Locked,
    Unlocked,
}

/// What the embedding should render for the current gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView {
    /// Initialization pending: render nothing so protected content never
    /// flashes before the lock state is known.
    Pending,
    /// Render the wrapped content.
    Content,
    /// Render the password prompt. `error` marks a failed attempt until the
    /// next keystroke; `shake` is a one-shot pulse consumed by this read.
    Prompt { error: bool, shake: bool },
}

struct GateInner {
    state: GateState,
    /// Last-known server signal; false until the initial fetch resolves.
    has_env_settings_password: bool,
    error: bool,
    shake: bool,
    /// Cleared on unmount so late async results are dropped.
    alive: bool,
}

/// The guard component. All recomputations read and write the single
/// mutex-guarded state, including the last-known server flag, so the
/// settings subscription and the pending initial fetch cannot race each
/// other into a stale lock decision.
pub struct SettingsGate {
    inner: Arc<Mutex<GateInner>>,
    settings: Arc<dyn SettingsStore>,
    session: Arc<dyn SessionStore>,
    api: Arc<dyn ConfigApi>,
    _subscription: Subscription,
}

impl SettingsGate {
    /// Mount the gate and subscribe to settings changes. The state starts
    /// Uninitialized (rendering [`GateView::Pending`]) until
    /// [`initialize`](Self::initialize) runs.
    pub fn mount(
        settings: Arc<dyn SettingsStore>,
        session: Arc<dyn SessionStore>,
        api: Arc<dyn ConfigApi>,
    ) -> Self {
        let inner = Arc::new(Mutex::new(GateInner {
            state: GateState::Uninitialized,
            has_env_settings_password: false,
            error: false,
            shake: false,
            alive: true,
        }));

        let weak: Weak<Mutex<GateInner>> = Arc::downgrade(&inner);
        let settings_for_listener = settings.clone();
        let session_for_listener = session.clone();
        let subscription = settings.subscribe(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Self::on_settings_change(
                    &inner,
                    settings_for_listener.as_ref(),
                    session_for_listener.as_ref(),
                );
            }
        }));

        SettingsGate {
            inner,
            settings,
            session,
            api,
            _subscription: subscription,
        }
    }

    /// Two-phase initialization: a synchronous local computation followed by
    /// one remote status fetch. A failed fetch is logged and the local-only
    /// computation stands for this cycle; the gate never fails open to
    /// fully unlocked because the server could not be reached.
    pub async fn initialize(&self) {
        let local = self.settings.get_settings();
        let session_unlocked = self.session.is_unlocked();

        {
            let mut inner = self.inner.lock().expect("gate state poisoned");
            if !inner.alive {
                return;
            }
            inner.state = if local.requires_password() && !session_unlocked {
                GateState::Locked
            } else {
                GateState::Unlocked
            };
        }

        match self.api.fetch_status().await {
            Ok(status) => {
                // Re-read the local signals: settings may have changed while
                // the fetch was in flight.
                let local = self.settings.get_settings();
                let session_unlocked = self.session.is_unlocked();

                let mut inner = self.inner.lock().expect("gate state poisoned");
                if !inner.alive {
                    return;
                }
                inner.has_env_settings_password = status.has_env_settings_password;
                let protected = local.requires_password() || status.has_env_settings_password;
                inner.state = if protected && !session_unlocked {
                    GateState::Locked
                } else {
                    GateState::Unlocked
                };
            }
            Err(e) => error!("Settings gate init fetch failed: {}", e),
        }
    }

    /// Attempt an unlock. Local passwords are checked first and succeed
    /// without any network call; the endpoint is only consulted when the
    /// server reported a settings password. Any failure (wrong password or
    /// network error) leaves the gate locked with the error indicator set.
    pub async fn unlock(&self, password: &str) -> bool {
        let local = self.settings.get_settings();

        if local.settings_passwords.iter().any(|p| p == password) {
            debug!("Unlocked via local settings password");
            self.set_unlocked();
            return true;
        }

        let has_env_settings_password = self
            .inner
            .lock()
            .expect("gate state poisoned")
            .has_env_settings_password;
        if has_env_settings_password {
            match self.api.validate(password, Scope::Settings).await {
                Ok(true) => {
                    debug!("Unlocked via server-side settings password");
                    self.set_unlocked();
                    return true;
                }
                Ok(false) => {}
                Err(e) => error!("Password validation request failed: {}", e),
            }
        }

        let mut inner = self.inner.lock().expect("gate state poisoned");
        if inner.alive {
            inner.error = true;
            inner.shake = true;
        }
        false
    }

    /// The prompt input changed; clear the error indicator.
    pub fn input_changed(&self) {
        self.inner.lock().expect("gate state poisoned").error = false;
    }

    /// What should be rendered right now.
    pub fn view(&self) -> GateView {
        let mut inner = self.inner.lock().expect("gate state poisoned");
        match inner.state {
            GateState::Uninitialized => GateView::Pending,
            GateState::Unlocked => GateView::Content,
            GateState::Locked => GateView::Prompt {
                error: inner.error,
                shake: std::mem::take(&mut inner.shake),
            },
        }
    }

    /// Current lifecycle state, for embeddings that drive their own rendering.
    pub fn state(&self) -> GateState {
        self.inner.lock().expect("gate state poisoned").state
    }

    /// Tear the gate down. Async results resolving afterwards are dropped.
    pub fn unmount(&self) {
        self.inner.lock().expect("gate state poisoned").alive = false;
    }

    fn set_unlocked(&self) {
        // Liveness first: an unlock racing an unmount must not persist the
        // session flag after the gate is gone.
        let mut inner = self.inner.lock().expect("gate state poisoned");
        if !inner.alive {
            return;
        }
        self.session.set_unlocked();
        inner.state = GateState::Unlocked;
        inner.error = false;
    }

    /// Settings-change recompute. Uses the latest local settings, the
    /// last-known server signal and the current session flag. When nothing
    /// requires a password anymore the gate auto-unlocks regardless of the
    /// session flag.
    fn on_settings_change(
        inner: &Mutex<GateInner>,
        settings: &dyn SettingsStore,
        session: &dyn SessionStore,
    ) {
        let local = settings.get_settings();
        let session_unlocked = session.is_unlocked();

        let mut inner = inner.lock().expect("gate state poisoned");
        if inner.state == GateState::Uninitialized {
            // initialize() has not published its provisional computation yet
            // and re-reads the store itself, so this notification can be
            // skipped without losing the update.
            return;
        }

        let protected = local.requires_password() || inner.has_env_settings_password;
        if !protected {
            inner.state = GateState::Unlocked;
        } else if !session_unlocked {
            inner.state = GateState::Locked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted endpoint double; counts validation calls so tests can assert
    /// local unlocks stay off the network.
    #[derive(Default)]
    struct StubConfigApi {
        has_env_settings_password: bool,
        settings_password: Option<String>,
        fail_fetch: bool,
        fail_validate: bool,
        validate_calls: AtomicUsize,
    }

    impl StubConfigApi {
        fn none() -> Self {
            StubConfigApi::default()
        }

        fn with_settings_password(password: &str) -> Self {
            StubConfigApi {
                has_env_settings_password: true,
                settings_password: Some(password.to_string()),
                ..Self::none()
            }
        }

        fn unreachable_endpoint() -> Self {
            StubConfigApi {
                fail_fetch: true,
                fail_validate: true,
                ..Self::none()
            }
        }
    }

    #[async_trait]
    impl ConfigApi for StubConfigApi {
        async fn fetch_status(&self) -> Result<ConfigStatus, String> {
            if self.fail_fetch {
                return Err("connection refused".to_string());
            }
            Ok(ConfigStatus {
                has_env_password: false,
                has_env_settings_password: self.has_env_settings_password,
                persist_password: true,
                subscription_sources: String::new(),
            })
        }

        async fn validate(&self, password: &str, _scope: Scope) -> Result<bool, String> {
            self.validate_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_validate {
                return Err("connection refused".to_string());
            }
            Ok(self.settings_password.as_deref() == Some(password))
        }
    }

    fn local(enabled: bool, passwords: &[&str]) -> LocalSettings {
        LocalSettings {
            settings_password_enabled: enabled,
            settings_passwords: passwords.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn mount(
        settings: LocalSettings,
        api: StubConfigApi,
    ) -> (
        SettingsGate,
        Arc<MemorySettingsStore>,
        Arc<MemorySessionStore>,
    ) {
        let store = Arc::new(MemorySettingsStore::new(settings));
        let session = Arc::new(MemorySessionStore::default());
        let gate = SettingsGate::mount(store.clone(), session.clone(), Arc::new(api));
        (gate, store, session)
    }

    #[tokio::test]
    async fn unprotected_gate_renders_content_without_prompting() {
        let (gate, _store, _session) = mount(LocalSettings::default(), StubConfigApi::none());

        assert_eq!(gate.view(), GateView::Pending);
        gate.initialize().await;
        assert_eq!(gate.view(), GateView::Content);
    }

    #[tokio::test]
    async fn disabled_local_passwords_do_not_lock() {
        let (gate, _store, _session) = mount(local(false, &["pw"]), StubConfigApi::none());

        gate.initialize().await;
        assert_eq!(gate.view(), GateView::Content);
    }

    #[tokio::test]
    async fn local_password_unlocks_without_network_call() {
        let api = StubConfigApi::none();
        let store = Arc::new(MemorySettingsStore::new(local(true, &["pw1", "pw2"])));
        let session = Arc::new(MemorySessionStore::default());
        let api = Arc::new(api);
        let gate = SettingsGate::mount(store, session.clone(), api.clone());

        gate.initialize().await;
        assert_eq!(
            gate.view(),
            GateView::Prompt {
                error: false,
                shake: false
            }
        );

        assert!(gate.unlock("pw2").await);
        assert_eq!(gate.view(), GateView::Content);
        assert!(session.is_unlocked());
        assert_eq!(api.validate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_password_sets_error_and_one_shot_shake() {
        let (gate, _store, _session) = mount(local(true, &["pw"]), StubConfigApi::none());
        gate.initialize().await;

        assert!(!gate.unlock("nope").await);
        assert_eq!(
            gate.view(),
            GateView::Prompt {
                error: true,
                shake: true
            }
        );
        // The shake pulse is consumed by the read; the error indicator stays.
        assert_eq!(
            gate.view(),
            GateView::Prompt {
                error: true,
                shake: false
            }
        );

        gate.input_changed();
        assert_eq!(
            gate.view(),
            GateView::Prompt {
                error: false,
                shake: false
            }
        );
    }

    #[tokio::test]
    async fn server_settings_password_unlocks_via_endpoint() {
        let (gate, _store, _session) = mount(
            LocalSettings::default(),
            StubConfigApi::with_settings_password("abc123"),
        );

        gate.initialize().await;
        assert_eq!(gate.state(), GateState::Locked);

        assert!(!gate.unlock("wrong").await);
        assert_eq!(gate.state(), GateState::Locked);

        assert!(gate.unlock("abc123").await);
        assert_eq!(gate.view(), GateView::Content);
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_local_signal() {
        // Locally unprotected: a dead endpoint must not lock the gate.
        let (gate, _store, _session) =
            mount(LocalSettings::default(), StubConfigApi::unreachable_endpoint());
        gate.initialize().await;
        assert_eq!(gate.view(), GateView::Content);

        // Locally protected: a dead endpoint must not unlock it either.
        let (gate, _store, _session) =
            mount(local(true, &["pw"]), StubConfigApi::unreachable_endpoint());
        gate.initialize().await;
        assert_eq!(gate.state(), GateState::Locked);
    }

    #[tokio::test]
    async fn validation_network_failure_reads_as_failed_attempt() {
        // The status fetch succeeds (the gate learns the server has a
        // settings password) but the validation call itself fails.
        let api = StubConfigApi {
            has_env_settings_password: true,
            fail_validate: true,
            ..StubConfigApi::none()
        };
        let (gate, _store, session) = mount(LocalSettings::default(), api);
        gate.initialize().await;

        assert!(!gate.unlock("abc123").await);
        assert!(!session.is_unlocked());
        assert_eq!(
            gate.view(),
            GateView::Prompt {
                error: true,
                shake: true
            }
        );
    }

    #[tokio::test]
    async fn session_flag_persists_across_remounts() {
        let store = Arc::new(MemorySettingsStore::new(local(true, &["pw"])));
        let session = Arc::new(MemorySessionStore::default());

        let gate = SettingsGate::mount(
            store.clone(),
            session.clone(),
            Arc::new(StubConfigApi::none()),
        );
        gate.initialize().await;
        assert!(gate.unlock("pw").await);
        gate.unmount();
        drop(gate);

        // Same session: the flag is still set, so a remount starts unlocked.
        let gate = SettingsGate::mount(
            store.clone(),
            session.clone(),
            Arc::new(StubConfigApi::none()),
        );
        gate.initialize().await;
        assert_eq!(gate.view(), GateView::Content);
        gate.unmount();
        drop(gate);

        // Fresh session: the flag is gone and protection is still active.
        session.clear();
        let gate = SettingsGate::mount(store, session, Arc::new(StubConfigApi::none()));
        gate.initialize().await;
        assert_eq!(gate.state(), GateState::Locked);
    }

    #[tokio::test]
    async fn removing_all_passwords_auto_unlocks_via_subscription() {
        let (gate, store, _session) = mount(local(true, &["pw"]), StubConfigApi::none());
        gate.initialize().await;
        assert_eq!(gate.state(), GateState::Locked);

        store.update(LocalSettings::default());
        assert_eq!(gate.view(), GateView::Content);
    }

    #[tokio::test]
    async fn settings_change_keeps_lock_while_still_protected() {
        let (gate, store, _session) = mount(local(true, &["pw"]), StubConfigApi::none());
        gate.initialize().await;

        store.update(local(true, &["other"]));
        assert_eq!(gate.state(), GateState::Locked);
    }

    #[tokio::test]
    async fn server_signal_keeps_gate_locked_when_local_passwords_removed() {
        let (gate, store, _session) = mount(
            local(true, &["pw"]),
            StubConfigApi::with_settings_password("abc123"),
        );
        gate.initialize().await;

        // Local passwords go away but the server still requires one.
        store.update(LocalSettings::default());
        assert_eq!(gate.state(), GateState::Locked);
    }

    #[tokio::test]
    async fn settings_change_before_initialize_does_not_publish_state() {
        let (gate, store, _session) = mount(LocalSettings::default(), StubConfigApi::none());

        store.update(local(true, &["pw"]));
        assert_eq!(gate.view(), GateView::Pending);

        // Initialization re-reads the store, so the update is not lost.
        gate.initialize().await;
        assert_eq!(gate.state(), GateState::Locked);
    }

    #[tokio::test]
    async fn unlock_after_unmount_does_not_persist_session_flag() {
        let (gate, _store, session) = mount(local(true, &["pw"]), StubConfigApi::none());
        gate.initialize().await;
        assert_eq!(gate.state(), GateState::Locked);

        gate.unmount();
        gate.unlock("pw").await;
        assert!(!session.is_unlocked());
    }

    #[tokio::test]
    async fn unmounted_gate_ignores_late_results() {
        let (gate, _store, _session) = mount(
            LocalSettings::default(),
            StubConfigApi::with_settings_password("abc123"),
        );

        gate.unmount();
        gate.initialize().await;
        assert_eq!(gate.view(), GateView::Pending);
    }
}
