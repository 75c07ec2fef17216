//! Authentication session state machine.
//!
//! Owns the unauthenticated → verifying → authenticated/failed transitions,
//! performs silent verification from the stored token pair, and drives the
//! realtime channel lifecycle on auth transitions. The realtime connection
//! is best-effort: a connect failure is logged and never reverts the
//! session state.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use nestmate_core::retry::RetryClass;
use nestmate_core::{RealtimeHandle, TokenStore};

use crate::client::ApiClient;
use crate::error::ApiError;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Verifying,
    Authenticated,
    Failed,
}

/// What to do when silent verification fails for a reason that is not a
/// definitive credential rejection. A 401/403 on refresh always clears the
/// stored pair regardless of this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyFailurePolicy {
    /// Source behavior: treat "cannot verify" as "logged out".
    #[default]
    Logout,
    /// Keep the stored pair and end in `Failed`; the caller may re-verify.
    Retry,
    /// Keep the pair only for transport failures (device offline); any
    /// other failure still clears.
    OfflineMode,
}

/// Owns authentication state and the stored credential pair.
pub struct SessionManager {
    api: Arc<ApiClient>,
    tokens: TokenStore,
    realtime: Option<Arc<dyn RealtimeHandle>>,
    policy: VerifyFailurePolicy,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionManager {
    /// Create a manager in the `Verifying` state. Callers are expected to
    /// run [`verify`](Self::verify) immediately after construction; the
    /// constructor itself performs no I/O.
    pub fn new(api: Arc<ApiClient>, tokens: TokenStore) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Verifying);
        Self {
            api,
            tokens,
            realtime: None,
            policy: VerifyFailurePolicy::default(),
            state_tx,
            state_rx,
        }
    }

    /// Attach the realtime channel driven on auth transitions.
    pub fn with_realtime(mut self, realtime: Arc<dyn RealtimeHandle>) -> Self {
        self.realtime = Some(realtime);
        self
    }

    /// Override the verify-failure policy (default: `Logout`).
    pub fn with_verify_failure_policy(mut self, policy: VerifyFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Observable session state for UI layers.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    fn set_state(&self, state: SessionState) {
        // send only fails when every receiver is gone; the manager holds one.
        let _ = self.state_tx.send(state);
    }

    /// Silent verification from the stored pair.
    ///
    /// No stored tokens: ends `Unauthenticated` without any network call.
    /// A refresh token is always preferred: one refresh call, persist the
    /// rotated pair, then one forced profile fetch. An access-only pair
    /// attempts the profile fetch directly.
    pub async fn verify(&self) -> SessionState {
        self.set_state(SessionState::Verifying);

        let stored = match self.tokens.get_tokens() {
            Ok(stored) => stored,
            Err(err) => {
                warn!("Token read failed during verification: {}", err);
                return self.fail_verification(ApiError::Storage(err));
            }
        };

        if stored.is_empty() {
            debug!("No stored tokens; skipping silent verification");
            self.set_state(SessionState::Unauthenticated);
            return SessionState::Unauthenticated;
        }

        if let Some(refresh) = stored.refresh_token {
            match self.api.refresh_token(&refresh).await {
                Ok(pair) => {
                    if let Err(err) = self.tokens.save_tokens(&pair.access, &pair.refresh) {
                        warn!("Failed to persist refreshed tokens: {}", err);
                        return self.fail_verification(ApiError::Storage(err));
                    }
                }
                Err(err) => {
                    debug!("Token refresh failed: {}", err);
                    return self.fail_verification(err);
                }
            }
        }

        // Forced server fetch; get_me never consults a local profile cache.
        match self.api.get_me().await {
            Ok(user) => {
                info!("Silent verification succeeded for user {}", user.id);
                self.enter_authenticated(user.id).await;
                SessionState::Authenticated
            }
            Err(err) => {
                debug!("Profile fetch failed during verification: {}", err);
                self.fail_verification(err)
            }
        }
    }

    /// Called by the UI after a successful interactive login, once tokens
    /// are saved and the user id is known.
    pub async fn login_success(&self, user_id: i64) {
        self.enter_authenticated(user_id).await;
    }

    /// Disconnect realtime, clear tokens, end `Unauthenticated`.
    /// Server-side token invalidation is best-effort.
    pub async fn logout(&self) {
        if let Some(realtime) = &self.realtime {
            realtime.disconnect().await;
        }

        if let Ok(stored) = self.tokens.get_tokens() {
            if let Some(refresh) = stored.refresh_token {
                if let Err(err) = self.api.logout(&refresh).await {
                    debug!("Server-side logout failed (ignored): {}", err);
                }
            }
        }

        if let Err(err) = self.tokens.clear_tokens() {
            warn!("Failed to clear tokens on logout: {}", err);
        }
        self.set_state(SessionState::Unauthenticated);
    }

    async fn enter_authenticated(&self, user_id: i64) {
        self.set_state(SessionState::Authenticated);

        if let Some(realtime) = &self.realtime {
            if let Err(err) = realtime.connect(user_id).await {
                // Messaging is a side channel, not session-critical.
                warn!("Realtime connect failed after authentication: {}", err);
            }
        }
    }

    fn fail_verification(&self, err: ApiError) -> SessionState {
        let clear = match err.retry_class() {
            RetryClass::ReauthRequired => true,
            _ => match self.policy {
                VerifyFailurePolicy::Logout => true,
                VerifyFailurePolicy::Retry => false,
                VerifyFailurePolicy::OfflineMode => !err.is_transport(),
            },
        };

        if clear {
            if let Err(storage_err) = self.tokens.clear_tokens() {
                warn!("Failed to clear tokens after verify failure: {}", storage_err);
            }
            self.set_state(SessionState::Unauthenticated);
            SessionState::Unauthenticated
        } else {
            self.set_state(SessionState::Failed);
            SessionState::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{start_mock_server, MockOutcome};
    use async_trait::async_trait;
    use nestmate_core::{MemorySecretStore, SecretStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRealtime {
        connects: Mutex<Vec<i64>>,
        disconnects: Mutex<u32>,
        fail_connect: bool,
    }

    #[async_trait]
    impl RealtimeHandle for FakeRealtime {
        async fn connect(&self, user_id: i64) -> Result<(), String> {
            self.connects.lock().unwrap().push(user_id);
            if self.fail_connect {
                Err("connection refused".to_string())
            } else {
                Ok(())
            }
        }

        async fn disconnect(&self) {
            *self.disconnects.lock().unwrap() += 1;
        }
    }

    fn manager_with(base_url: &str) -> (SessionManager, TokenStore) {
        let tokens = TokenStore::new(Arc::new(MemorySecretStore::new()));
        let api = Arc::new(ApiClient::new(base_url, tokens.clone()));
        (SessionManager::new(api, tokens.clone()), tokens)
    }

    const PROFILE_BODY: &str = r#"{"id":42,"email":"a@b.c","first_name":"A","last_name":"B"}"#;

    #[tokio::test]
    async fn verify_without_tokens_makes_no_network_call() {
        let (base_url, captured, server) = start_mock_server(vec![]).await;
        let (session, _tokens) = manager_with(&base_url);

        assert_eq!(session.verify().await, SessionState::Unauthenticated);
        assert!(captured.lock().await.is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn verify_prefers_refresh_then_fetches_profile_once() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::respond(200, r#"{"access":"a2","refresh":"r2"}"#),
            MockOutcome::respond(200, PROFILE_BODY),
        ])
        .await;
        let (session, tokens) = manager_with(&base_url);
        tokens.save_tokens("a1", "r1").expect("seed");

        assert_eq!(session.verify().await, SessionState::Authenticated);

        let requests = captured.lock().await.clone();
        let paths: Vec<&str> = requests.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/api/v1/authenticate/token/refresh/", "/api/v1/users/me/"]
        );

        // the rotated pair replaced the old one
        let stored = tokens.get_tokens().expect("read");
        assert_eq!(stored.access_token.as_deref(), Some("a2"));
        assert_eq!(stored.refresh_token.as_deref(), Some("r2"));

        server.abort();
    }

    #[tokio::test]
    async fn verify_with_rejected_refresh_clears_tokens() {
        let (base_url, _captured, server) = start_mock_server(vec![MockOutcome::respond(
            401,
            r#"{"detail":"Token is invalid or expired"}"#,
        )])
        .await;
        let (session, tokens) = manager_with(&base_url);
        tokens.save_tokens("a1", "expired").expect("seed");

        assert_eq!(session.verify().await, SessionState::Unauthenticated);
        assert!(tokens.get_tokens().expect("read").is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn access_only_pair_skips_refresh() {
        let (base_url, captured, server) =
            start_mock_server(vec![MockOutcome::respond(200, PROFILE_BODY)]).await;

        let backing = Arc::new(MemorySecretStore::new());
        backing
            .set_secret(nestmate_core::tokens::ACCESS_TOKEN_KEY, "only-access")
            .expect("seed");
        let tokens = TokenStore::new(backing);
        let api = Arc::new(ApiClient::new(&base_url, tokens.clone()));
        let session = SessionManager::new(api, tokens);

        assert_eq!(session.verify().await, SessionState::Authenticated);
        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/api/v1/users/me/");

        server.abort();
    }

    #[tokio::test]
    async fn retry_policy_keeps_tokens_on_transient_failure() {
        let (base_url, _captured, server) =
            start_mock_server(vec![MockOutcome::DropConnection]).await;
        let (session, tokens) = manager_with(&base_url);
        let session = session.with_verify_failure_policy(VerifyFailurePolicy::Retry);
        tokens.save_tokens("a1", "r1").expect("seed");

        assert_eq!(session.verify().await, SessionState::Failed);
        assert!(tokens.get_tokens().expect("read").as_pair().is_some());

        server.abort();
    }

    #[tokio::test]
    async fn offline_policy_keeps_tokens_when_transport_fails() {
        let (base_url, _captured, server) =
            start_mock_server(vec![MockOutcome::DropConnection]).await;
        let (session, tokens) = manager_with(&base_url);
        let session = session.with_verify_failure_policy(VerifyFailurePolicy::OfflineMode);
        tokens.save_tokens("a1", "r1").expect("seed");

        assert_eq!(session.verify().await, SessionState::Failed);
        assert!(tokens.get_tokens().expect("read").as_pair().is_some());

        server.abort();
    }

    #[tokio::test]
    async fn offline_policy_still_clears_on_reauth() {
        let (base_url, _captured, server) = start_mock_server(vec![MockOutcome::respond(
            403,
            r#"{"detail":"blacklisted"}"#,
        )])
        .await;
        let (session, tokens) = manager_with(&base_url);
        let session = session.with_verify_failure_policy(VerifyFailurePolicy::OfflineMode);
        tokens.save_tokens("a1", "r1").expect("seed");

        assert_eq!(session.verify().await, SessionState::Unauthenticated);
        assert!(tokens.get_tokens().expect("read").is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn realtime_connects_on_auth_and_failure_is_nonfatal() {
        let (base_url, _captured, server) = start_mock_server(vec![
            MockOutcome::respond(200, r#"{"access":"a2","refresh":"r2"}"#),
            MockOutcome::respond(200, PROFILE_BODY),
        ])
        .await;
        let (session, tokens) = manager_with(&base_url);
        let realtime = Arc::new(FakeRealtime {
            fail_connect: true,
            ..FakeRealtime::default()
        });
        let session = session.with_realtime(realtime.clone());
        tokens.save_tokens("a1", "r1").expect("seed");

        // connect fails, session state is unaffected
        assert_eq!(session.verify().await, SessionState::Authenticated);
        assert_eq!(*realtime.connects.lock().unwrap(), vec![42]);

        server.abort();
    }

    #[tokio::test]
    async fn logout_disconnects_realtime_and_clears() {
        let (base_url, captured, server) =
            start_mock_server(vec![MockOutcome::respond(200, r#"{"success":true}"#)]).await;
        let (session, tokens) = manager_with(&base_url);
        let realtime = Arc::new(FakeRealtime::default());
        let session = session.with_realtime(realtime.clone());
        tokens.save_tokens("a1", "r1").expect("seed");

        session.logout().await;

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(*realtime.disconnects.lock().unwrap(), 1);
        assert!(tokens.get_tokens().expect("read").is_empty());
        let requests = captured.lock().await.clone();
        assert_eq!(requests[0].path, "/api/v1/authenticate/logout/");

        server.abort();
    }
}
