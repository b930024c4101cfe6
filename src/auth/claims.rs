//! JWT claim decoding, for display only
//!
//! Nothing here is verified and nothing here drives refresh decisions;
//! refresh happens only when the API answers 401.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub company_slug: Option<String>,
    pub db_name: Option<String>,
    pub exp: Option<i64>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp?, 0)
    }
}

/// Decode the payload segment of a JWT. Returns None for opaque tokens.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_decode_tenant_claims() {
        let token = jwt(serde_json::json!({
            "sub": "42",
            "username": "ada",
            "role": "admin",
            "company_slug": "acme_ltd",
            "db_name": "acme_db",
            "exp": 1_700_000_000
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.username.as_deref(), Some("ada"));
        assert_eq!(claims.db_name.as_deref(), Some("acme_db"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_opaque_token_has_no_claims() {
        assert!(decode_claims("opaque-token").is_none());
        assert!(decode_claims("a.!!!.c").is_none());
    }
}
