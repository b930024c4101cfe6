//! Auth and identity models

use serde::{Deserialize, Serialize};

/// Body of the login and refresh endpoints
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Also set as an HttpOnly cookie by the server.
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: Option<UserRead>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginInput<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserCreate<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Registered user as returned by login and register
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct UserRead {
    pub id: serde_json::Value,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: Option<String>,
    pub role: String,
}

/// Response of the identity endpoint (/api/auth/me)
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub user: MeUser,
    #[serde(default)]
    pub company: CompanyContext,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeUser {
    pub id: serde_json::Value,
    pub username: String,
    pub email: String,
    pub role: String,
}

/// Tenant context of the signed-in user
#[allow(dead_code)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyContext {
    pub id: Option<serde_json::Value>,
    pub slug: Option<String>,
    pub db_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_response() {
        let body = serde_json::json!({
            "access_token": "T1",
            "refresh_token": "R1",
            "token_type": "bearer",
            "user": {
                "id": 7,
                "username": "ada",
                "email": "ada@example.com",
                "is_active": true,
                "created_at": "2025-01-02T03:04:05",
                "role": "admin"
            }
        });
        let resp: LoginResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.access_token, "T1");
        assert_eq!(resp.refresh_token.as_deref(), Some("R1"));
        assert_eq!(resp.user.unwrap().username, "ada");
    }

    #[test]
    fn test_parse_master_me_response() {
        let body = serde_json::json!({
            "user": {"id": 0, "username": "master", "email": "admin@joslasync.com", "role": "master"},
            "company": {"db_name": "invoicedb"}
        });
        let me: MeResponse = serde_json::from_value(body).unwrap();
        assert_eq!(me.user.role, "master");
        assert_eq!(me.company.db_name.as_deref(), Some("invoicedb"));
        assert!(me.company.slug.is_none());
    }
}
