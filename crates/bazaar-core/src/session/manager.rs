//! Session manager: login, registration, logout and startup restore.
//!
//! Every transition replaces the published [`Session`] wholesale. Storage is
//! written under a separate persistence lock before the watch channel's write
//! lock is taken, so readers never wait on disk I/O. Login and registration
//! each carry a monotonic sequence number; a response is applied only if no
//! newer call of the same kind was issued meanwhile.

use super::state::{
    AuthError, AuthErrorKind, Credentials, LOGIN_FALLBACK, REGISTER_FALLBACK, Session,
};
use crate::error::Result;
use crate::storage::{Storage, TOKEN_KEY, USER_KEY};
use crate::types::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Remote side of the auth operations.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /api/login`. A non-success status is an `Err`.
    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse>;

    /// `POST /api/register`. A non-success status is an `Err`.
    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse>;
}

/// Owner of the process-wide session.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    storage: Arc<dyn Storage>,
    state: watch::Sender<Session>,
    login_seq: AtomicU64,
    register_seq: AtomicU64,
    /// Serialises storage writes with the publish that follows them.
    persist_lock: Mutex<()>,
}

impl SessionManager {
    /// Create an anonymous manager without reading storage.
    pub fn new(backend: Arc<dyn AuthBackend>, storage: Arc<dyn Storage>) -> Self {
        Self::with_session(backend, storage, Session::anonymous())
    }

    /// Create a manager from persisted state.
    ///
    /// A stored token and identity are trusted as-is; the server is not
    /// contacted. A lone entry or an unreadable identity is discarded.
    pub fn restore(backend: Arc<dyn AuthBackend>, storage: Arc<dyn Storage>) -> Self {
        let session = match load_credentials(storage.as_ref()) {
            Ok(Some(credentials)) => {
                debug!("Restored session for {}", credentials.user.username);
                Session::authenticated(credentials)
            }
            Ok(None) => Session::anonymous(),
            Err(e) => {
                warn!("Failed to read persisted session: {}", e);
                Session::anonymous()
            }
        };
        Self::with_session(backend, storage, session)
    }

    fn with_session(
        backend: Arc<dyn AuthBackend>,
        storage: Arc<dyn Storage>,
        session: Session,
    ) -> Self {
        Self {
            backend,
            storage,
            state: watch::Sender::new(session),
            login_seq: AtomicU64::new(0),
            register_seq: AtomicU64::new(0),
            persist_lock: Mutex::new(()),
        }
    }

    /// Current session.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified after every completed transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Log in and persist the returned credentials.
    ///
    /// On failure the previous credentials stay in place and the error is
    /// also recorded as the session's `last_error`.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<User, AuthError> {
        let seq = self.login_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        debug!("Login #{} for {}", seq, username);
        let result = match self.backend.login(&req).await {
            Ok(resp) => credentials_from(resp),
            Err(e) => {
                debug!("Login #{} failed: {}", seq, e);
                Err(AuthError::from_client_error(&e, LOGIN_FALLBACK))
            }
        };

        let _guard = self.persist_guard();
        if self.login_seq.load(Ordering::SeqCst) != seq {
            debug!("Discarding stale login #{}", seq);
            return Err(AuthError::superseded());
        }

        let previous = self.state.borrow().credentials().cloned();
        let applied = result.and_then(|credentials| {
            self.persist(&credentials, previous.as_ref())?;
            Ok(credentials)
        });
        let persisted = applied.is_ok();

        let mut outcome = Err(AuthError::superseded());
        let published = self.state.send_if_modified(|session| {
            // A newer login may have been issued while storage was written
            if self.login_seq.load(Ordering::SeqCst) != seq {
                debug!("Discarding stale login #{}", seq);
                return false;
            }

            match applied {
                Ok(credentials) => {
                    info!("Logged in as {}", credentials.user.username);
                    outcome = Ok(credentials.user.clone());
                    *session = Session::authenticated(credentials);
                }
                Err(err) => {
                    warn!("Login failed: {}", err);
                    *session = session.with_error(Some(err.clone()));
                    outcome = Err(err);
                }
            }
            true
        });

        if !published && persisted {
            let current = self.state.borrow().credentials().cloned();
            self.reset_persisted(current.as_ref());
        }
        outcome
    }

    /// Create an account. Never changes the credentials: the caller has to
    /// log in afterwards.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> std::result::Result<RegisterResponse, AuthError> {
        let seq = self.register_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let req = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        debug!("Register #{} for {}", seq, username);
        let result = match self.backend.register(&req).await {
            Ok(resp) if resp.success => Ok(resp),
            // A success status without the success flag breaks the reply contract
            Ok(resp) => Err(AuthError::from_body(
                AuthErrorKind::Malformed,
                &resp.error_body(),
                REGISTER_FALLBACK,
            )),
            Err(e) => Err(AuthError::from_client_error(&e, REGISTER_FALLBACK)),
        };

        let mut outcome = Err(AuthError::superseded());
        self.state.send_if_modified(|session| {
            if self.register_seq.load(Ordering::SeqCst) != seq {
                debug!("Discarding stale registration #{}", seq);
                return false;
            }

            match result {
                Ok(resp) => {
                    info!("Registered account {}", username);
                    *session = session.with_error(None);
                    outcome = Ok(resp);
                }
                Err(err) => {
                    warn!("Registration failed: {}", err);
                    *session = session.with_error(Some(err.clone()));
                    outcome = Err(err);
                }
            }
            true
        });
        outcome
    }

    /// Drop the credentials and wipe them from storage. Always succeeds.
    ///
    /// Any login still in flight is invalidated.
    pub fn logout(&self) {
        let _guard = self.persist_guard();
        self.login_seq.fetch_add(1, Ordering::SeqCst);
        self.clear_persisted();

        self.state.send_modify(|session| {
            if session.is_authenticated() {
                info!("Logged out");
            }
            *session = Session::anonymous();
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    fn persist_guard(&self) -> MutexGuard<'_, ()> {
        self.persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `credentials`, or leave storage holding `previous` on failure.
    ///
    /// The token goes first: if it cannot be written nothing has changed yet.
    fn persist(
        &self,
        credentials: &Credentials,
        previous: Option<&Credentials>,
    ) -> std::result::Result<(), AuthError> {
        let failed = |e: crate::error::Error| {
            warn!("Failed to persist session: {}", e);
            AuthError::new(AuthErrorKind::Storage, format!("Failed to save session: {}", e))
        };

        let user = serde_json::to_string(&credentials.user)
            .map_err(|e| failed(e.into()))?;
        self.storage
            .set(TOKEN_KEY, &credentials.token)
            .map_err(failed)?;

        if let Err(e) = self.storage.set(USER_KEY, &user) {
            self.reset_persisted(previous);
            return Err(failed(e));
        }
        Ok(())
    }

    /// Put storage back to `credentials`, or empty it for an anonymous session.
    fn reset_persisted(&self, credentials: Option<&Credentials>) {
        let Some(credentials) = credentials else {
            self.clear_persisted();
            return;
        };

        let user = serde_json::to_string(&credentials.user).map_err(crate::error::Error::from);
        for result in [
            self.storage.set(TOKEN_KEY, &credentials.token),
            user.and_then(|user| self.storage.set(USER_KEY, &user)),
        ] {
            if let Err(e) = result {
                warn!("Failed to restore persisted session: {}", e);
            }
        }
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!("Failed to remove persisted {}: {}", key, e);
            }
        }
    }
}

/// Accept a login response only if it carries both a token and a user.
fn credentials_from(resp: LoginResponse) -> std::result::Result<Credentials, AuthError> {
    let token = resp.token.filter(|t| !t.trim().is_empty());
    match (token, resp.user) {
        (Some(token), Some(user)) => Ok(Credentials { user, token }),
        _ => {
            let message = resp
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| LOGIN_FALLBACK.to_string());
            Err(AuthError::new(AuthErrorKind::Malformed, message))
        }
    }
}

/// Read both entries; anything but a complete pair counts as no session.
fn load_credentials(storage: &dyn Storage) -> Result<Option<Credentials>> {
    let token = storage.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty());
    let user = storage.get(USER_KEY)?;

    let credentials = match (token, user) {
        (None, None) => return Ok(None),
        (Some(token), Some(user)) => match serde_json::from_str::<User>(&user) {
            Ok(user) => Some(Credentials {
                user,
                token: token.trim().to_string(),
            }),
            Err(e) => {
                warn!("Discarding unreadable persisted identity: {}", e);
                None
            }
        },
        _ => {
            warn!("Discarding incomplete persisted session");
            None
        }
    };

    if credentials.is_none() {
        storage.remove(TOKEN_KEY)?;
        storage.remove(USER_KEY)?;
    }
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::SessionState;
    use crate::storage::MemoryStorage;
    use crate::types::ErrorBody;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;
    use tokio_test::{assert_err, assert_ok};

    /// Backend answering from fixed rules: `u`/`p` logs in, anything else
    /// is rejected. Calls for a gated username wait for the gate to open.
    #[derive(Default)]
    struct FakeBackend {
        calls: AtomicUsize,
        gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
        register_response: Mutex<Option<RegisterResponse>>,
    }

    impl FakeBackend {
        fn gate(&self, username: &str) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(username.to_string(), rx);
            tx
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().unwrap().remove(&req.username);
            if let Some(gate) = gate {
                let _ = gate.await;
            }

            match (req.username.as_str(), req.password.as_str()) {
                ("u" | "first" | "second", "p") => Ok(LoginResponse {
                    message: Some("Logged in successfully".into()),
                    error: None,
                    token: Some(format!("token-{}", req.username)),
                    user: Some(User::new(1, req.username.clone())),
                }),
                ("malformed", _) => Ok(LoginResponse {
                    message: Some("Logged in successfully".into()),
                    ..LoginResponse::default()
                }),
                ("offline", _) => Err(Error::Transport("connection refused".into())),
                _ => Err(Error::api(
                    401,
                    ErrorBody {
                        error: Some("invalid credentials".into()),
                        ..ErrorBody::default()
                    },
                )),
            }
        }

        async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().unwrap().remove(&req.username);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if let Some(resp) = self.register_response.lock().unwrap().clone() {
                return Ok(resp);
            }
            if req.username == "taken" {
                let mut body = ErrorBody {
                    error: Some("Username already exists".into()),
                    message: Some("This username is already taken".into()),
                    ..ErrorBody::default()
                };
                body.fields
                    .insert("username".into(), "This username is already taken".into());
                return Err(Error::api(400, body));
            }
            Ok(RegisterResponse {
                success: true,
                message: Some("User registered successfully".into()),
                ..RegisterResponse::default()
            })
        }
    }

    /// Storage that refuses every write.
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("read-only".into()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Memory storage whose writes to one key can be made to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        broken: Mutex<Option<&'static str>>,
    }

    impl FlakyStorage {
        fn break_key(&self, key: &'static str) {
            *self.broken.lock().unwrap() = Some(key);
        }
    }

    impl Storage for FlakyStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if *self.broken.lock().unwrap() == Some(key) {
                return Err(Error::Storage(format!("{} is not writable", key)));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn setup() -> (Arc<FakeBackend>, Arc<MemoryStorage>, SessionManager) {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(backend.clone(), storage.clone());
        (backend, storage, manager)
    }

    fn assert_invariant(manager: &SessionManager, storage: &MemoryStorage) {
        let session = manager.snapshot();
        assert_eq!(session.current_user().is_some(), session.auth_token().is_some());

        let token = storage.get(TOKEN_KEY).unwrap();
        let user = storage.get(USER_KEY).unwrap();
        assert_eq!(token.is_some(), user.is_some());
    }

    #[tokio::test]
    async fn test_login_success_authenticates_and_persists() {
        let (_, storage, manager) = setup();

        let user = assert_ok!(manager.login("u", "p").await);
        assert_eq!(user.username, "u");

        let session = manager.snapshot();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.auth_token(), Some("token-u"));
        assert!(session.last_error().is_none());

        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("token-u"));
        let stored: User = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, User::new(1, "u"));
    }

    #[tokio::test]
    async fn test_login_failure_sets_server_message() {
        let (_, storage, manager) = setup();

        let err = assert_err!(manager.login("u", "wrong").await);
        assert_eq!(err.kind, AuthErrorKind::Rejected { status: 401 });

        let session = manager.snapshot();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.last_error().map(|e| e.message.as_str()), Some("invalid credentials"));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_login_transport_failure_uses_fallback() {
        let (_, _, manager) = setup();

        let err = assert_err!(manager.login("offline", "p").await);
        assert_eq!(err.kind, AuthErrorKind::Transport);
        assert_eq!(err.message, LOGIN_FALLBACK);
        assert_eq!(manager.snapshot().state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_login_without_token_is_malformed() {
        let (_, storage, manager) = setup();

        let err = assert_err!(manager.login("malformed", "p").await);
        assert_eq!(err.kind, AuthErrorKind::Malformed);
        assert_eq!(err.message, LOGIN_FALLBACK);
        assert!(!manager.snapshot().is_authenticated());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_credentials() {
        let (_, storage, manager) = setup();
        assert_ok!(manager.login("u", "p").await);

        assert_err!(manager.login("u", "wrong").await);

        let session = manager.snapshot();
        assert_eq!(session.auth_token(), Some("token-u"));
        assert!(session.last_error().is_some());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("token-u"));
    }

    #[tokio::test]
    async fn test_login_storage_failure_stays_anonymous() {
        let backend = Arc::new(FakeBackend::default());
        let manager = SessionManager::new(backend, Arc::new(ReadOnlyStorage));

        let err = assert_err!(manager.login("u", "p").await);
        assert_eq!(err.kind, AuthErrorKind::Storage);
        assert!(!manager.snapshot().is_authenticated());
    }

    async fn assert_failed_persist_keeps_previous(key: &'static str) {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(FlakyStorage::default());
        let manager = SessionManager::new(backend.clone(), storage.clone());
        assert_ok!(manager.login("u", "p").await);

        storage.break_key(key);
        let err = assert_err!(manager.login("second", "p").await);
        assert_eq!(err.kind, AuthErrorKind::Storage);
        assert_eq!(manager.snapshot().auth_token(), Some("token-u"));

        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("token-u"));
        let stored: User = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, User::new(1, "u"));

        // The earlier session survives a restart
        let restarted = SessionManager::restore(backend, storage);
        assert_eq!(restarted.snapshot().auth_token(), Some("token-u"));
    }

    #[tokio::test]
    async fn test_token_write_failure_keeps_persisted_session() {
        assert_failed_persist_keeps_previous(TOKEN_KEY).await;
    }

    #[tokio::test]
    async fn test_user_write_failure_restores_persisted_token() {
        assert_failed_persist_keeps_previous(USER_KEY).await;
    }

    #[tokio::test]
    async fn test_user_write_failure_while_anonymous_leaves_storage_empty() {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(FlakyStorage::default());
        storage.break_key(USER_KEY);
        let manager = SessionManager::new(backend, storage.clone());

        assert_err!(manager.login("u", "p").await);
        assert!(!manager.snapshot().is_authenticated());
        assert!(storage.inner.is_empty());
    }

    #[tokio::test]
    async fn test_register_does_not_change_state() {
        let (_, storage, manager) = setup();

        let resp = assert_ok!(manager.register("new", "new@example.com", "secret").await);
        assert!(resp.success);
        assert_eq!(manager.snapshot().state(), SessionState::Anonymous);
        assert!(storage.is_empty());

        assert_ok!(manager.login("u", "p").await);
        assert_ok!(manager.register("other", "other@example.com", "secret").await);
        let session = manager.snapshot();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.auth_token(), Some("token-u"));
    }

    #[tokio::test]
    async fn test_register_failure_carries_fields() {
        let (_, _, manager) = setup();

        let err = assert_err!(manager.register("taken", "t@example.com", "secret").await);
        assert_eq!(err.message, "Username already exists");
        assert_eq!(err.field("username"), Some("This username is already taken"));

        let session = manager.snapshot();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.last_error(), Some(&err));

        // A later success clears the error
        assert_ok!(manager.register("fresh", "f@example.com", "secret").await);
        assert!(manager.snapshot().last_error().is_none());
    }

    #[tokio::test]
    async fn test_register_without_success_flag_fails() {
        let (backend, _, manager) = setup();
        *backend.register_response.lock().unwrap() = Some(RegisterResponse::default());

        let err = assert_err!(manager.register("x", "x@example.com", "secret").await);
        assert_eq!(err.message, REGISTER_FALLBACK);
        assert_eq!(err.kind, AuthErrorKind::Malformed);
    }

    #[tokio::test]
    async fn test_logout_clears_state_and_storage() {
        let (_, storage, manager) = setup();
        assert_ok!(manager.login("u", "p").await);

        manager.logout();
        assert_eq!(manager.snapshot(), Session::anonymous());
        assert!(storage.is_empty());

        // Second logout is a no-op
        manager.logout();
        assert_eq!(manager.snapshot().state(), SessionState::Anonymous);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_last_error() {
        let (_, _, manager) = setup();
        assert_err!(manager.login("u", "wrong").await);

        manager.logout();
        assert!(manager.snapshot().last_error().is_none());
    }

    #[test]
    fn test_restore_without_network() {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "T").unwrap();
        storage.set(USER_KEY, r#"{"id":2,"username":"v"}"#).unwrap();

        let manager = SessionManager::restore(backend.clone(), storage);

        let session = manager.snapshot();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.auth_token(), Some("T"));
        assert_eq!(session.current_user(), Some(&User::new(2, "v")));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_restore_empty_storage_is_anonymous() {
        let backend = Arc::new(FakeBackend::default());
        let manager = SessionManager::restore(backend, Arc::new(MemoryStorage::new()));
        assert_eq!(manager.snapshot().state(), SessionState::Anonymous);
    }

    #[test]
    fn test_restore_discards_incomplete_session() {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "T").unwrap();

        let manager = SessionManager::restore(backend, storage.clone());
        assert_eq!(manager.snapshot().state(), SessionState::Anonymous);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_restore_discards_corrupt_identity() {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "T").unwrap();
        storage.set(USER_KEY, "not json").unwrap();

        let manager = SessionManager::restore(backend, storage.clone());
        assert!(!manager.snapshot().is_authenticated());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_last_issued_login_wins() {
        let (backend, storage, manager) = setup();
        let release_first = backend.gate("first");

        // "first" is issued first but resolves after "second"
        let (first, second, ()) = tokio::join!(
            manager.login("first", "p"),
            manager.login("second", "p"),
            async {
                let _ = release_first.send(());
            }
        );

        assert!(assert_err!(first).is_superseded());
        assert_eq!(assert_ok!(second).username, "second");

        let session = manager.snapshot();
        assert_eq!(session.auth_token(), Some("token-second"));
        assert!(session.last_error().is_none());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("token-second"));
    }

    #[tokio::test]
    async fn test_last_issued_register_wins() {
        let (backend, _, manager) = setup();
        let release_first = backend.gate("first");

        // "first" would succeed and clear the error, but a newer call was issued
        let (first, second, ()) = tokio::join!(
            manager.register("first", "first@example.com", "pw"),
            manager.register("taken", "t@example.com", "pw"),
            async {
                let _ = release_first.send(());
            }
        );

        assert!(assert_err!(first).is_superseded());
        let second = assert_err!(second);
        assert_eq!(manager.snapshot().last_error(), Some(&second));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_login_does_not_supersede_register() {
        let (backend, _, manager) = setup();
        let release = backend.gate("new");

        let (register, login, ()) = tokio::join!(
            manager.register("new", "new@example.com", "pw"),
            manager.login("u", "p"),
            async {
                let _ = release.send(());
            }
        );

        assert_ok!(register);
        assert_ok!(login);
        assert_eq!(manager.snapshot().auth_token(), Some("token-u"));
    }

    #[tokio::test]
    async fn test_logout_discards_in_flight_login() {
        let (backend, storage, manager) = setup();
        let release = backend.gate("u");

        let (login, ()) = tokio::join!(manager.login("u", "p"), async {
            manager.logout();
            let _ = release.send(());
        });

        assert!(assert_err!(login).is_superseded());
        assert_eq!(manager.snapshot().state(), SessionState::Anonymous);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let (_, _, manager) = setup();
        let mut rx = manager.subscribe();

        assert_ok!(manager.login("u", "p").await);
        assert_ok!(rx.changed().await);
        assert!(rx.borrow_and_update().is_authenticated());

        manager.logout();
        assert_ok!(rx.changed().await);
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_invariant_holds_across_sequences() {
        let (_, storage, manager) = setup();

        assert_invariant(&manager, &storage);
        let _ = manager.login("u", "wrong").await;
        assert_invariant(&manager, &storage);
        let _ = manager.login("u", "p").await;
        assert_invariant(&manager, &storage);
        let _ = manager.register("taken", "t@example.com", "pw").await;
        assert_invariant(&manager, &storage);
        let _ = manager.login("malformed", "p").await;
        assert_invariant(&manager, &storage);
        manager.logout();
        assert_invariant(&manager, &storage);
        let _ = manager.login("offline", "p").await;
        assert_invariant(&manager, &storage);
    }
}
