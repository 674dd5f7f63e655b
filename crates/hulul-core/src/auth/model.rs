//! Authentication domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Role claim value that grants administrative access.
pub const ADMIN_ROLE_CLAIM: &str = "admin";

/// Role derived from the session's role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    /// Derives the role from an optional claim. Only the exact `admin` claim maps to `Admin`.
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim {
            Some(ADMIN_ROLE_CLAIM) => Role::Admin,
            _ => Role::Member,
        }
    }
}

/// The authenticated user as exposed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_claim: Option<String>,
}

/// A validated session issued by the identity provider.
///
/// Gateways build this record from their wire responses; nothing past the
/// gateway boundary sees untyped session payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_claim: Option<String>,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn role(&self) -> Role {
        Role::from_claim(self.role_claim.as_deref())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    pub fn user(&self) -> AuthUser {
        AuthUser {
            id: self.user_id.clone(),
            email: self.email.clone(),
            role_claim: self.role_claim.clone(),
        }
    }

    /// Returns true when the access token expires within `margin` of `now`.
    ///
    /// A session without a known expiry is treated as still valid.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + margin,
            None => false,
        }
    }
}

/// Client-side authentication state.
///
/// This is the state the session store owns and persists. `is_admin` is always
/// derived from the session's role claim, never set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<AuthSession>,
}

impl AuthState {
    /// The signed-out state.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// The signed-in state for `session`, with `is_admin` derived from its role claim.
    pub fn authenticated(session: AuthSession) -> Self {
        Self {
            user: Some(session.user()),
            is_admin: session.is_admin(),
            is_authenticated: true,
            session: Some(session),
        }
    }

    /// Builds the state for an optional session.
    pub fn from_session(session: Option<AuthSession>) -> Self {
        match session {
            Some(session) => Self::authenticated(session),
            None => Self::unauthenticated(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
    }
}

/// Current version of the persisted auth record.
pub const PERSISTED_AUTH_STATE_VERSION: u32 = 1;

/// The persisted subset of the session store, written under the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAuthState {
    pub version: u32,
    pub state: AuthState,
}

impl PersistedAuthState {
    pub fn new(state: AuthState) -> Self {
        Self {
            version: PERSISTED_AUTH_STATE_VERSION,
            state,
        }
    }

    /// Returns the restored state, or `None` when the record was written by an
    /// incompatible version or is internally inconsistent.
    pub fn into_state(self) -> Option<AuthState> {
        if self.version != PERSISTED_AUTH_STATE_VERSION {
            return None;
        }
        let is_authenticated = self.state.is_authenticated;
        match self.state.session {
            Some(session) if is_authenticated => Some(AuthState::authenticated(session)),
            None if !is_authenticated => Some(AuthState::unauthenticated()),
            _ => None,
        }
    }
}

/// Optional profile data sent along with a sign-up request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role_claim: Option<&str>) -> AuthSession {
        AuthSession {
            user_id: "user-1".to_string(),
            email: Some("a@b.com".to_string()),
            role_claim: role_claim.map(str::to_string),
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            issued_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn test_role_derivation() {
        assert_eq!(Role::from_claim(Some("admin")), Role::Admin);
        assert_eq!(Role::from_claim(Some("Admin")), Role::Member);
        assert_eq!(Role::from_claim(Some("member")), Role::Member);
        assert_eq!(Role::from_claim(None), Role::Member);
    }

    #[test]
    fn test_authenticated_state_derives_admin() {
        let state = AuthState::authenticated(session(Some("admin")));
        assert!(state.is_authenticated);
        assert!(state.is_admin);
        assert_eq!(state.user_id(), Some("user-1"));

        let state = AuthState::authenticated(session(None));
        assert!(!state.is_admin);
    }

    #[test]
    fn test_unauthenticated_state() {
        let state = AuthState::from_session(None);
        assert_eq!(state, AuthState::unauthenticated());
        assert!(state.user.is_none());
        assert!(!state.is_authenticated);
        assert!(!state.is_admin);
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let mut s = session(None);
        assert!(!s.expires_within(now, Duration::seconds(30)));

        s.expires_at = Some(now + Duration::seconds(10));
        assert!(s.expires_within(now, Duration::seconds(30)));

        s.expires_at = Some(now + Duration::hours(1));
        assert!(!s.expires_within(now, Duration::seconds(30)));
    }

    #[test]
    fn test_persisted_state_rejects_inconsistent_record() {
        let mut state = AuthState::authenticated(session(Some("admin")));
        state.session = None;
        assert!(PersistedAuthState::new(state).into_state().is_none());

        let stale = PersistedAuthState {
            version: 0,
            state: AuthState::unauthenticated(),
        };
        assert!(stale.into_state().is_none());
    }

    #[test]
    fn test_persisted_state_rederives_admin_flag() {
        let mut state = AuthState::authenticated(session(Some("member")));
        state.is_admin = true;
        let restored = PersistedAuthState::new(state).into_state().unwrap();
        assert!(!restored.is_admin);
    }
}
