//! Unverified JWT claim decoding.
//!
//! Only used to read `sub` and `exp` from access tokens the identity
//! provider just issued. Signatures are checked server side.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hulul_core::error::{HululError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl JwtClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

pub fn decode_claims(token: &str) -> Result<JwtClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| HululError::auth("access token is not a JWT"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| HululError::auth(format!("malformed access token: {}", e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(claims: serde_json::Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    #[test]
    fn test_decodes_claims() {
        let claims = decode_claims(&token(serde_json::json!({
            "sub": "user-1",
            "exp": 1_709_290_800,
            "role": "authenticated"
        })))
        .unwrap();
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_709_290_800);
    }

    #[test]
    fn test_rejects_non_jwt() {
        assert!(decode_claims("opaque").unwrap_err().is_auth());
        assert!(decode_claims("a.!!!.c").unwrap_err().is_auth());
    }
}
