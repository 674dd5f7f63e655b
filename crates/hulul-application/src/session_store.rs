//! The client's authentication context.
//!
//! `SessionStore` owns the [`AuthState`], persists it through a
//! [`SessionStorage`] and publishes every transition on a watch channel.
//! It is the only writer of that state.

use std::sync::Arc;
use std::time::Duration;

use hulul_core::auth::{
    AccessTokenSource, AuthGateway, AuthSession, AuthState, PersistedAuthState, SessionStorage,
    SignUpMetadata,
};
use hulul_core::config::RouteConfig;
use hulul_core::error::Result;
use tokio::sync::watch;

use crate::timeout::bounded;

/// What happened to the remote half of a sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSignOut {
    /// There was no local session, so no remote call was made.
    Skipped,
    Confirmed,
    /// The remote call failed; local state was cleared anyway.
    Failed(String),
}

/// Result of [`SessionStore::sign_out`]: where to navigate, and the remote outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutOutcome {
    pub route: String,
    pub remote: RemoteSignOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account was created and is now signed in.
    SessionStarted,
    /// The account must confirm its email before signing in.
    ConfirmationRequired,
}

pub struct SessionStore {
    state: watch::Sender<AuthState>,
    gateway: Arc<dyn AuthGateway>,
    storage: Arc<dyn SessionStorage>,
    routes: RouteConfig,
    request_timeout: Duration,
}

impl SessionStore {
    /// Creates a store in the unauthenticated state. Call [`init`](Self::init)
    /// to restore a persisted session.
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        storage: Arc<dyn SessionStorage>,
        routes: RouteConfig,
        request_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::unauthenticated());
        Self {
            state,
            gateway,
            storage,
            routes,
            request_timeout,
        }
    }

    /// Restores the persisted state.
    ///
    /// A missing record leaves the store signed out. A record that cannot be
    /// read or fails validation is removed.
    pub async fn init(&self) -> AuthState {
        let restored = match self.storage.load().await {
            Ok(Some(record)) => match record.into_state() {
                Some(state) => Some(state),
                None => {
                    tracing::warn!("[SessionStore] Discarding incompatible auth record");
                    self.remove_record().await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("[SessionStore] Failed to read auth record: {}", e);
                self.remove_record().await;
                None
            }
        };

        let state = restored.unwrap_or_default();
        tracing::info!(
            "[SessionStore] Initialized (authenticated: {}, admin: {})",
            state.is_authenticated,
            state.is_admin
        );
        self.state.send_replace(state.clone());
        state
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.borrow().user_id().map(str::to_string)
    }

    pub fn login_route(&self) -> &str {
        &self.routes.login_path
    }

    /// Signs in with email and password.
    ///
    /// On failure the state is left unchanged and the error is returned.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthState> {
        let session = bounded(
            self.request_timeout,
            "sign in",
            self.gateway.sign_in_with_password(email, password),
        )
        .await?;
        tracing::info!("[SessionStore] Signed in as {}", session.user_id);
        Ok(self.set_session(Some(session)).await)
    }

    /// Replaces the session. `None` signs out locally. The result is persisted.
    pub async fn set_session(&self, session: Option<AuthSession>) -> AuthState {
        let state = AuthState::from_session(session);
        self.state.send_replace(state.clone());
        self.persist(&state).await;
        state
    }

    /// Asks the identity provider whether the persisted session is still live.
    ///
    /// Any failure clears the state.
    pub async fn check_session(&self) -> AuthState {
        let persisted = self.state.borrow().session.clone();
        let result = bounded(
            self.request_timeout,
            "check session",
            self.gateway.current_session(persisted.as_ref()),
        )
        .await;

        match result {
            Ok(Some(session)) => self.set_session(Some(session)).await,
            Ok(None) => {
                if persisted.is_some() {
                    tracing::info!("[SessionStore] Stored session is no longer valid");
                }
                self.set_session(None).await
            }
            Err(e) => {
                tracing::warn!("[SessionStore] Session check failed, signing out locally: {}", e);
                self.set_session(None).await
            }
        }
    }

    /// Signs out. Never fails.
    ///
    /// Local state, the persisted record and ephemeral session storage are
    /// cleared whether or not the identity provider confirms.
    pub async fn sign_out(&self) -> SignOutOutcome {
        let session = self.state.borrow().session.clone();

        let remote = match session {
            None => RemoteSignOut::Skipped,
            Some(session) => {
                match bounded(self.request_timeout, "sign out", self.gateway.sign_out(&session))
                    .await
                {
                    Ok(()) => RemoteSignOut::Confirmed,
                    Err(e) => {
                        tracing::warn!("[SessionStore] Remote sign out failed: {}", e);
                        RemoteSignOut::Failed(e.to_string())
                    }
                }
            }
        };

        self.state.send_replace(AuthState::unauthenticated());
        self.remove_record().await;
        if let Err(e) = self.storage.clear_ephemeral().await {
            tracing::warn!("[SessionStore] Failed to clear session storage: {}", e);
        }
        tracing::info!("[SessionStore] Signed out ({:?})", remote);

        SignOutOutcome {
            route: self.routes.login_path.clone(),
            remote,
        }
    }

    /// Registers an account. When no email confirmation is required the new
    /// session becomes current.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome> {
        let session = bounded(
            self.request_timeout,
            "sign up",
            self.gateway.sign_up(email, password, metadata),
        )
        .await?;
        match session {
            Some(session) => {
                self.set_session(Some(session)).await;
                Ok(SignUpOutcome::SessionStarted)
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    /// Requests a password reset email linking to the configured reset page.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        bounded(
            self.request_timeout,
            "reset password",
            self.gateway.reset_password(email, &self.routes.reset_password_url),
        )
        .await
    }

    async fn persist(&self, state: &AuthState) {
        // The in-memory state stays authoritative when the write fails.
        if let Err(e) = self
            .storage
            .save(&PersistedAuthState::new(state.clone()))
            .await
        {
            tracing::warn!("[SessionStore] Failed to persist auth state: {}", e);
        }
    }

    async fn remove_record(&self) {
        if let Err(e) = self.storage.remove().await {
            tracing::warn!("[SessionStore] Failed to remove auth record: {}", e);
        }
    }
}

impl AccessTokenSource for SessionStore {
    fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(str::to_string)
    }
}
