//! Token storage and management

use anyhow::Result;

/// Token store trait for different storage backends.
///
/// The access token is the short-lived bearer credential. The refresh token
/// is the long-lived credential presented to the refresh endpoint.
pub trait TokenStore: Send {
    fn get_access_token(&self) -> Option<String>;
    fn set_access_token(&mut self, token: String) -> Result<()>;
    fn get_refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&mut self, token: String) -> Result<()>;
    fn clear_tokens(&mut self) -> Result<()>;
}

/// Process-local store, used when nothing should survive the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        Self {
            access_token: access_token.map(String::from),
            refresh_token: refresh_token.map(String::from),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    fn set_access_token(&mut self, token: String) -> Result<()> {
        self.access_token = Some(token);
        Ok(())
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) -> Result<()> {
        self.refresh_token = Some(token);
        Ok(())
    }

    fn clear_tokens(&mut self) -> Result<()> {
        self.access_token = None;
        self.refresh_token = None;
        Ok(())
    }
}
