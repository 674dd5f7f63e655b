//! Auth gateway trait.
//!
//! Defines the interface to the remote identity provider.

use async_trait::async_trait;

use super::model::{AuthSession, SignUpMetadata};
use crate::error::Result;

/// An abstract identity provider.
///
/// Credential verification and token issuance happen remotely; implementations
/// translate wire responses into validated [`AuthSession`] records.
///
/// # Implementation Notes
///
/// - Rejected credentials and revoked tokens map to `HululError::Auth`.
/// - Network and server failures map to `HululError::Gateway`.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Verifies an email/password pair and issues a session.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Revokes the given session remotely.
    async fn sign_out(&self, session: &AuthSession) -> Result<()>;

    /// Resolves the current session, validating or refreshing `persisted` if given.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(session))`: a live session exists
    /// - `Ok(None)`: no session (never signed in, or the token was rejected)
    /// - `Err(_)`: the provider could not be reached
    async fn current_session(&self, persisted: Option<&AuthSession>) -> Result<Option<AuthSession>>;

    /// Registers a new account.
    ///
    /// Returns `Ok(None)` when the account must confirm its email before a
    /// session is issued.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Option<AuthSession>>;

    /// Sends a password reset email that links back to `redirect_to`.
    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<()>;
}

/// Supplies the bearer token of the current session to data gateways.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}
