//! Identity provider gateway backed by the GoTrue REST API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hulul_core::auth::{AuthGateway, AuthSession, SignUpMetadata};
use hulul_core::error::{HululError, Result};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use super::jwt::decode_claims;
use super::{SupabaseClient, send, send_json, status_error, transport_error};

/// Sessions expiring within this margin are refreshed during validation.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Map<String, serde_json::Value>,
}

impl UserResponse {
    fn role_claim(&self) -> Option<String> {
        self.user_metadata
            .get("role")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a SignUpMetadata,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

/// Builds the typed session from a token response.
fn session_from_token(response: TokenResponse, now: DateTime<Utc>) -> Result<AuthSession> {
    if response.user.id.trim().is_empty() || response.access_token.trim().is_empty() {
        return Err(HululError::auth("identity provider returned an empty session"));
    }
    let expires_at = response
        .expires_at
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| response.expires_in.map(|secs| now + Duration::seconds(secs)))
        .or_else(|| {
            decode_claims(&response.access_token)
                .ok()
                .and_then(|claims| claims.expires_at())
        });
    let role_claim = response.user.role_claim();

    Ok(AuthSession {
        user_id: response.user.id,
        email: response.user.email,
        role_claim,
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        issued_at: now,
        expires_at,
    })
}

/// `AuthGateway` implementation for the hosted identity provider.
#[derive(Clone)]
pub struct SupabaseAuthGateway {
    client: SupabaseClient,
}

impl SupabaseAuthGateway {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn refresh(&self, session: &AuthSession) -> Result<Option<AuthSession>> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::debug!("[SupabaseAuth] Session expired and has no refresh token");
            return Ok(None);
        };

        let response = self
            .client
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token })
            .send()
            .await
            .map_err(|e| transport_error("refresh session", e))?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| transport_error("refresh session", e))?;
            tracing::debug!("[SupabaseAuth] Refreshed session for {}", token.user.id);
            return session_from_token(token, Utc::now()).map(Some);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!("[SupabaseAuth] Refresh token rejected: {}", body);
                Ok(None)
            }
            _ => Err(status_error(status, &body)),
        }
    }
}

#[async_trait]
impl AuthGateway for SupabaseAuthGateway {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password });
        let token: TokenResponse = send_json("sign in", request).await?;
        session_from_token(token, Utc::now())
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<()> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/logout")
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| transport_error("sign out", e))?;

        let status = response.status();
        // A token the server no longer knows is already signed out.
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND
        {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(HululError::gateway(format!(
            "sign out failed with {}: {}",
            status,
            super::error_message(status, &body)
        )))
    }

    async fn current_session(&self, persisted: Option<&AuthSession>) -> Result<Option<AuthSession>> {
        let Some(session) = persisted else {
            return Ok(None);
        };

        if session.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
            return self.refresh(session).await;
        }

        let response = self
            .client
            .request(Method::GET, "/auth/v1/user")
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| transport_error("validate session", e))?;

        let status = response.status();
        if status.is_success() {
            let user: UserResponse = response
                .json()
                .await
                .map_err(|e| transport_error("validate session", e))?;
            let role_claim = user.role_claim();
            return Ok(Some(AuthSession {
                user_id: user.id,
                email: user.email.or_else(|| session.email.clone()),
                role_claim,
                ..session.clone()
            }));
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!("[SupabaseAuth] Stored session rejected, trying refresh");
                self.refresh(session).await
            }
            _ => Err(status_error(status, &body)),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Option<AuthSession>> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/signup")
            .json(&SignUpRequest {
                email,
                password,
                data: metadata,
            });
        let body: serde_json::Value = send_json("sign up", request).await?;

        // Without email confirmation the response carries a full session;
        // otherwise only the pending user is returned.
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            return session_from_token(token, Utc::now()).map(Some);
        }
        tracing::info!("[SupabaseAuth] Sign up for {} awaits email confirmation", email);
        Ok(None)
    }

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<()> {
        let mut request = self
            .client
            .request(Method::POST, "/auth/v1/recover")
            .json(&RecoverRequest { email });
        if !redirect_to.is_empty() {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        send("reset password", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token_json(metadata: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "access_token": "header.payload.sig",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": {
                "id": "user-1",
                "email": "a@x.io",
                "user_metadata": metadata
            }
        })
    }

    #[test]
    fn test_session_from_token_reads_role_claim() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let token: TokenResponse =
            serde_json::from_value(token_json(serde_json::json!({"role": "admin"}))).unwrap();
        let session = session_from_token(token, now).unwrap();

        assert_eq!(session.user_id, "user-1");
        assert!(session.is_admin());
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(session.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_session_without_role_is_member() {
        let token: TokenResponse =
            serde_json::from_value(token_json(serde_json::json!({"full_name": "Amal"}))).unwrap();
        let session = session_from_token(token, Utc::now()).unwrap();
        assert!(!session.is_admin());
        assert_eq!(session.role_claim, None);
    }

    #[test]
    fn test_non_string_role_is_ignored() {
        let token: TokenResponse =
            serde_json::from_value(token_json(serde_json::json!({"role": true}))).unwrap();
        assert_eq!(token.user.role_claim(), None);
    }

    #[test]
    fn test_empty_session_is_rejected() {
        let mut json = token_json(serde_json::json!({}));
        json["access_token"] = serde_json::json!("");
        let token: TokenResponse = serde_json::from_value(json).unwrap();
        assert!(session_from_token(token, Utc::now()).unwrap_err().is_auth());
    }
}
