//! Session manager: the single source of truth for who is logged in and the
//! only writer of the persisted session record.
//!
//! Flow Overview: `hydrate` loads the stored record, publishes it optimistically
//! as `Loading`, then asks the backend for the profile; success keeps the
//! session, any failure clears it. `login`/`register` write the record through
//! to storage and cookie before publishing or returning. `logout` clears
//! everything at once and supersedes anything still in flight.

use super::{
    store::SessionStore,
    types::{AuthResponse, LoginRequest, RegisterRequest, SessionState, UserProfile},
};
use crate::{error::AuthError, verifier::AuthVerifier};
use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::{Mutex as OperationLock, watch};
use tracing::{debug, info, instrument, warn};

pub struct SessionManager<V> {
    verifier: V,
    store: SessionStore,
    state: watch::Sender<SessionState>,
    /// One auth operation at a time.
    operation: OperationLock<()>,
    /// Bumped by every logout; results from before a logout are dropped.
    epoch: Mutex<u64>,
    verify_timeout: Option<Duration>,
}

impl<V: AuthVerifier> SessionManager<V> {
    #[must_use]
    pub fn new(verifier: V, store: SessionStore) -> Self {
        Self {
            verifier,
            store,
            state: watch::Sender::new(SessionState::default()),
            operation: OperationLock::new(()),
            epoch: Mutex::new(0),
            verify_timeout: None,
        }
    }

    /// Bound profile verification. Without it a backend that never answers
    /// keeps the session loading forever.
    #[must_use]
    pub const fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Read-only access for consumers such as the `check` action.
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Load and re-validate the persisted session. Never fails: anything that
    /// cannot be verified ends as an anonymous session with an empty store.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) {
        let _operation = self.operation.lock().await;

        let (epoch, token) = {
            let epoch = self.lock_epoch();
            let stored = match self.store.load() {
                Ok(stored) => stored,
                Err(err) => {
                    warn!("failed to read stored session: {err}");
                    None
                }
            };

            let Some(stored) = stored else {
                if self.store.has_residue().unwrap_or(true) {
                    debug!("clearing incomplete stored session");
                    self.clear_store();
                }
                self.state.send_replace(SessionState::anonymous());
                return;
            };

            let token = SecretString::from(stored.token);
            self.state
                .send_replace(SessionState::loading(token.clone(), stored.user));
            (*epoch, token)
        };

        self.revalidate(epoch, token).await;
    }

    /// Re-check the current token with the backend; no-op when anonymous.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) {
        let _operation = self.operation.lock().await;

        let (epoch, token) = {
            let epoch = self.lock_epoch();
            let current = self.current();
            let (Some(token), Some(user)) = (current.token().cloned(), current.user().cloned())
            else {
                return;
            };
            self.state
                .send_replace(SessionState::loading(token.clone(), user));
            (*epoch, token)
        };

        self.revalidate(epoch, token).await;
    }

    /// Sign in. The record is persisted (storage and cookie) before this
    /// returns, so a redirect decided from the response sees the new cookie.
    ///
    /// # Errors
    /// Returns `InvalidInput` for empty credentials, the backend's error
    /// unchanged on rejection, or `Storage` if the record cannot be written.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Email and password are required.".to_string(),
            ));
        }

        let _operation = self.operation.lock().await;
        let epoch = *self.lock_epoch();
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.verifier.login(&request).await?;
        self.commit(epoch, &response)?;
        info!(user_id = %response.user.id, "signed in");
        Ok(response)
    }

    /// Create an account; success signs the user in like [`Self::login`].
    ///
    /// # Errors
    /// Same as [`Self::login`]; the name is required as well.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Name, email and password are required.".to_string(),
            ));
        }

        let _operation = self.operation.lock().await;
        let epoch = *self.lock_epoch();
        let request = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.verifier.register(&request).await?;
        self.commit(epoch, &response)?;
        info!(user_id = %response.user.id, "registered and signed in");
        Ok(response)
    }

    /// Clear the session everywhere. No network call, cannot fail, and does
    /// not wait for operations in flight.
    pub fn logout(&self) {
        let mut epoch = self.lock_epoch();
        *epoch = epoch.wrapping_add(1);
        self.clear_store();
        self.state.send_replace(SessionState::anonymous());
        info!("signed out");
    }

    async fn revalidate(&self, started_at: u64, token: SecretString) {
        let verified = self.verify(token.expose_secret()).await;

        let epoch = self.lock_epoch();
        if *epoch != started_at {
            debug!("session changed during verification; dropping result");
            return;
        }

        match verified {
            Ok(user) => {
                if let Err(err) = self.store.save_profile(&user) {
                    warn!("failed to persist refreshed profile: {err}");
                }
                debug!(user_id = %user.id, "stored session verified");
                self.state
                    .send_replace(SessionState::authenticated(token, user));
            }
            Err(err) => {
                debug!("stored session rejected: {err}");
                self.clear_store();
                self.state.send_replace(SessionState::anonymous());
            }
        }
    }

    async fn verify(&self, token: &str) -> Result<UserProfile, AuthError> {
        match self.verify_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.verifier.profile(token))
                .await
                .map_err(|_| AuthError::Timeout("profile verification timed out".to_string()))?,
            None => self.verifier.profile(token).await,
        }
    }

    fn commit(&self, started_at: u64, response: &AuthResponse) -> Result<(), AuthError> {
        if response.access_token.is_empty() {
            return Err(AuthError::Parse(
                "The auth service did not return an access token.".to_string(),
            ));
        }

        let epoch = self.lock_epoch();
        if *epoch != started_at {
            return Err(AuthError::Superseded);
        }

        if let Err(err) = self.store.save(&response.access_token, &response.user) {
            warn!("failed to persist session: {err}");
            self.clear_store();
            self.state.send_replace(SessionState::anonymous());
            return Err(err.into());
        }

        self.state.send_replace(SessionState::authenticated(
            SecretString::from(response.access_token.clone()),
            response.user.clone(),
        ));
        Ok(())
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!("failed to clear stored session: {err}");
        }
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> std::fmt::Debug for SessionManager<V> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionManager")
            .field("phase", &self.state.borrow().phase())
            .field("verify_timeout", &self.verify_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{
        store::{TOKEN_KEY, USER_KEY},
        storage::{KeyValueStore, MemoryCookieJar, MemoryStorage},
        types::{SessionPhase, UserId},
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::sync::Notify;

    fn profile(role: &str) -> UserProfile {
        UserProfile {
            id: UserId::Number(1),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            role: role.to_string(),
        }
    }

    fn auth_response(role: &str, token: &str) -> AuthResponse {
        AuthResponse {
            user: profile(role),
            access_token: token.to_string(),
        }
    }

    #[derive(Default)]
    struct ScriptedVerifier {
        login: Mutex<Option<Result<AuthResponse, AuthError>>>,
        register: Mutex<Option<Result<AuthResponse, AuthError>>>,
        profile: Mutex<Option<Result<UserProfile, AuthError>>>,
        profile_pending: bool,
        /// When set, login and profile calls wait for a permit before answering.
        release: Option<Arc<Notify>>,
        login_calls: AtomicUsize,
        profile_calls: AtomicUsize,
        last_login: Mutex<Option<(String, String)>>,
    }

    impl ScriptedVerifier {
        fn take<T>(slot: &Mutex<Option<Result<T, AuthError>>>) -> Result<T, AuthError> {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .unwrap_or_else(|| Err(AuthError::Network("unscripted call".to_string())))
        }

        async fn held(&self) {
            if let Some(release) = &self.release {
                release.notified().await;
            }
        }
    }

    impl AuthVerifier for ScriptedVerifier {
        async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_login.lock().unwrap_or_else(PoisonError::into_inner) =
                Some((request.email.clone(), request.password.clone()));
            self.held().await;
            Self::take(&self.login)
        }

        async fn register(&self, _request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
            Self::take(&self.register)
        }

        async fn profile(&self, _token: &str) -> Result<UserProfile, AuthError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            if self.profile_pending {
                std::future::pending::<()>().await;
            }
            self.held().await;
            Self::take(&self.profile)
        }
    }

    fn scripted() -> Arc<ScriptedVerifier> {
        Arc::new(ScriptedVerifier::default())
    }

    #[tokio::test]
    async fn hydrate_with_empty_store_is_anonymous_without_network() {
        let verifier = scripted();
        let manager = SessionManager::new(verifier.clone(), SessionStore::in_memory());
        assert!(manager.current().is_loading());

        manager.hydrate().await;

        let state = manager.current();
        assert_eq!(state.phase(), SessionPhase::Anonymous);
        assert!(!state.is_loading());
        assert_eq!(verifier.profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_persists_token_profile_and_cookie() -> Result<(), AuthError> {
        let verifier = scripted();
        *verifier.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("admin", "T1")));
        let store = SessionStore::in_memory();
        let manager = SessionManager::new(verifier.clone(), store.clone());

        let response = manager.login(" a@b.com ", "secret1").await?;

        assert_eq!(response.access_token, "T1");
        assert_eq!(response.user.role, "admin");
        assert_eq!(
            *verifier.last_login.lock().unwrap_or_else(PoisonError::into_inner),
            Some(("a@b.com".to_string(), "secret1".to_string()))
        );
        assert_eq!(store.load()?.map(|s| s.token), Some("T1".to_string()));
        assert_eq!(store.cookie_token()?, Some("T1".to_string()));
        let state = manager.current();
        assert!(state.is_authenticated());
        assert_eq!(state.token().map(|t| t.expose_secret().to_string()), Some("T1".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn login_then_hydrate_round_trips() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        let first = scripted();
        *first.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("super_admin", "T9")));
        SessionManager::new(first, store.clone())
            .login("a@b.com", "secret1")
            .await?;

        let second = scripted();
        *second.profile.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(profile("super_admin")));
        let manager = SessionManager::new(second.clone(), store);
        manager.hydrate().await;

        let state = manager.current();
        assert!(state.is_authenticated());
        assert_eq!(state.user().map(|u| u.id.clone()), Some(UserId::Number(1)));
        assert_eq!(state.user().map(|u| u.role.as_str()), Some("super_admin"));
        assert_eq!(second.profile_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_empty_credentials_without_network() {
        let verifier = scripted();
        let manager = SessionManager::new(verifier.clone(), SessionStore::in_memory());

        let empty_email = manager.login("  ", "secret1").await;
        let empty_password = manager.login("a@b.com", "").await;

        assert!(matches!(empty_email, Err(AuthError::InvalidInput(_))));
        assert!(matches!(empty_password, Err(AuthError::InvalidInput(_))));
        assert_eq!(verifier.login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_failure_propagates_and_keeps_store_empty() -> Result<(), AuthError> {
        let verifier = scripted();
        *verifier.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Err(AuthError::Http {
                status: 401,
                message: "Invalid credentials".to_string(),
            }));
        let store = SessionStore::in_memory();
        let manager = SessionManager::new(verifier.clone(), store.clone());
        manager.hydrate().await;

        let result = manager.login("a@b.com", "wrong").await;

        match result {
            Err(AuthError::Http { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("expected http error, got {other:?}"),
        }
        assert_eq!(verifier.login_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load()?, None);
        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        Ok(())
    }

    #[tokio::test]
    async fn login_without_access_token_is_rejected() -> Result<(), AuthError> {
        let verifier = scripted();
        *verifier.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("user", "")));
        let store = SessionStore::in_memory();
        let manager = SessionManager::new(verifier, store.clone());

        let result = manager.login("a@b.com", "secret1").await;

        assert!(matches!(result, Err(AuthError::Parse(_))));
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn register_signs_the_user_in() -> Result<(), AuthError> {
        let verifier = scripted();
        *verifier.register.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("user", "R1")));
        let store = SessionStore::in_memory();
        let manager = SessionManager::new(verifier, store.clone());

        let response = manager.register("A", "a@b.com", "secret1").await?;

        assert_eq!(response.access_token, "R1");
        assert_eq!(store.cookie_token()?, Some("R1".to_string()));
        assert!(manager.current().is_authenticated());
        assert!(matches!(
            manager.register("", "a@b.com", "secret1").await,
            Err(AuthError::InvalidInput(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn hydrate_with_rejected_token_clears_everything() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        store.save("STALE", &profile("admin"))?;
        let verifier = scripted();
        *verifier.profile.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Err(AuthError::Http {
                status: 401,
                message: "Unauthorized".to_string(),
            }));
        let manager = SessionManager::new(verifier, store.clone());

        manager.hydrate().await;

        let state = manager.current();
        assert_eq!(state.phase(), SessionPhase::Anonymous);
        assert!(!state.is_loading());
        assert!(state.token().is_none());
        assert!(state.user().is_none());
        assert_eq!(store.load()?, None);
        assert_eq!(store.cookie_token()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn hydrate_network_failure_fails_closed() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        store.save("T1", &profile("user"))?;
        let verifier = scripted();
        *verifier.profile.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Err(AuthError::Network("connection refused".to_string())));
        let manager = SessionManager::new(verifier, store.clone());

        manager.hydrate().await;

        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert!(!store.has_residue()?);
        Ok(())
    }

    #[tokio::test]
    async fn hydrate_refreshes_stored_profile() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        store.save("T1", &profile("user"))?;
        let verifier = scripted();
        *verifier.profile.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(profile("admin")));
        let manager = SessionManager::new(verifier, store.clone());

        manager.hydrate().await;

        assert_eq!(
            manager.current().user().map(|u| u.role.clone()),
            Some("admin".to_string())
        );
        assert_eq!(store.load()?.map(|s| s.user.role), Some("admin".to_string()));
        assert_eq!(store.load()?.map(|s| s.token), Some("T1".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn hydrate_clears_token_without_profile() -> Result<(), AuthError> {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "T1")?;
        let store = SessionStore::new(storage.clone(), Arc::new(MemoryCookieJar::new()));
        let verifier = scripted();
        let manager = SessionManager::new(verifier.clone(), store);

        manager.hydrate().await;

        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(storage.get(TOKEN_KEY)?, None);
        assert_eq!(storage.get(USER_KEY)?, None);
        assert_eq!(verifier.profile_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_everything_and_next_hydrate_skips_network() -> Result<(), AuthError> {
        let verifier = scripted();
        *verifier.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("user", "T1")));
        let store = SessionStore::in_memory();
        let manager = SessionManager::new(verifier.clone(), store.clone());
        manager.login("a@b.com", "secret1").await?;

        manager.logout();

        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(store.load()?, None);
        assert_eq!(store.cookie_token()?, None);

        manager.hydrate().await;
        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(verifier.profile_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn verify_timeout_fails_closed() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        store.save("T1", &profile("admin"))?;
        let verifier = Arc::new(ScriptedVerifier {
            profile_pending: true,
            ..ScriptedVerifier::default()
        });
        let manager = SessionManager::new(verifier, store.clone())
            .with_verify_timeout(Duration::from_millis(20));

        manager.hydrate().await;

        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn logout_discards_hydration_that_finishes_later() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        store.save("T1", &profile("admin"))?;
        let release = Arc::new(Notify::new());
        let verifier = Arc::new(ScriptedVerifier {
            profile: Mutex::new(Some(Ok(profile("admin")))),
            release: Some(release.clone()),
            ..ScriptedVerifier::default()
        });
        let manager = Arc::new(SessionManager::new(verifier.clone(), store.clone()));
        let mut states = manager.subscribe();

        let hydrating = tokio::spawn({
            let manager = manager.clone();
            async move { manager.hydrate().await }
        });
        states
            .wait_for(|state| state.phase() == SessionPhase::Loading)
            .await
            .map_err(|_| AuthError::Network("state channel closed".to_string()))?;

        manager.logout();
        release.notify_one();
        hydrating
            .await
            .map_err(|err| AuthError::Network(err.to_string()))?;

        assert_eq!(verifier.profile_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(store.load()?, None);
        assert!(!store.has_residue()?);
        Ok(())
    }

    #[tokio::test]
    async fn logout_supersedes_login_in_flight() -> Result<(), AuthError> {
        let store = SessionStore::in_memory();
        let release = Arc::new(Notify::new());
        let verifier = Arc::new(ScriptedVerifier {
            login: Mutex::new(Some(Ok(auth_response("admin", "T1")))),
            release: Some(release.clone()),
            ..ScriptedVerifier::default()
        });
        let manager = Arc::new(SessionManager::new(verifier.clone(), store.clone()));

        let logging_in = tokio::spawn({
            let manager = manager.clone();
            async move { manager.login("a@b.com", "secret1").await }
        });
        while verifier.login_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        manager.logout();
        release.notify_one();
        let result = logging_in
            .await
            .map_err(|err| AuthError::Network(err.to_string()))?;

        assert!(matches!(result, Err(AuthError::Superseded)));
        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(store.load()?, None);
        assert_eq!(store.cookie_token()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_storage_file_does_not_block_login() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("storage.json"), "{not json")?;
        let store = SessionStore::in_dir(dir.path());
        let verifier = scripted();
        *verifier.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("admin", "T1")));
        let manager = SessionManager::new(verifier, store);

        manager.hydrate().await;
        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);

        manager.login("a@b.com", "secret1").await?;

        let reopened = SessionStore::in_dir(dir.path());
        assert_eq!(reopened.load()?.map(|s| s.token), Some("T1".to_string()));
        assert_eq!(reopened.cookie_token()?, Some("T1".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_profile_is_noop_when_anonymous() {
        let verifier = scripted();
        let manager = SessionManager::new(verifier.clone(), SessionStore::in_memory());
        manager.hydrate().await;

        manager.refresh_profile().await;

        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert_eq!(verifier.profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_profile_rejection_signs_out() -> Result<(), AuthError> {
        let verifier = scripted();
        *verifier.login.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Ok(auth_response("user", "T1")));
        *verifier.profile.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Err(AuthError::Http {
                status: 401,
                message: "Token expired".to_string(),
            }));
        let store = SessionStore::in_memory();
        let manager = SessionManager::new(verifier, store.clone());
        manager.login("a@b.com", "secret1").await?;

        manager.refresh_profile().await;

        assert_eq!(manager.current().phase(), SessionPhase::Anonymous);
        assert!(!store.has_residue()?);
        Ok(())
    }
}
