//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::TokenStore;

/// Overrides `api_url` from the config file.
pub const API_URL_ENV: &str = "JOSLASYNC_API_URL";

/// Access token for an ephemeral session; nothing is written to disk.
pub const TOKEN_ENV: &str = "JOSLASYNC_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_COOKIE: &str = "refresh_token";

/// Application configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the API, e.g. http://localhost:8000
    pub api_url: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Name of the cookie carrying the refresh credential
    pub refresh_cookie_name: Option<String>,
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "joslasync", "joslasync")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        write_private(path, &content)
    }

    /// API base URL, with the environment taking precedence over the file.
    pub fn api_url(&self) -> Result<String> {
        resolve_api_url(std::env::var(API_URL_ENV).ok(), self.api_url.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn refresh_cookie_name(&self) -> &str {
        self.refresh_cookie_name
            .as_deref()
            .unwrap_or(DEFAULT_REFRESH_COOKIE)
    }
}

fn resolve_api_url(from_env: Option<String>, from_file: Option<&str>) -> Result<String> {
    let raw = from_env
        .filter(|v| !v.trim().is_empty())
        .or_else(|| from_file.map(String::from))
        .with_context(|| {
            format!(
                "API URL is not configured. Set {} or run 'joslasync config --api-url <URL>'.",
                API_URL_ENV
            )
        })?;

    let trimmed = raw.trim().trim_end_matches('/');
    url::Url::parse(trimmed).with_context(|| format!("Invalid API URL '{}'", trimmed))?;
    Ok(trimmed.to_string())
}

/// Write a file readable only by the current user (it may contain tokens).
fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).context("Failed to set file permissions")?;
    }

    Ok(())
}

/// Persisted session credentials (credentials.toml next to config.toml)
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived bearer token
    access_token: Option<String>,
    /// Long-lived credential presented to the refresh endpoint
    refresh_token: Option<String>,
    #[serde(skip)]
    path: PathBuf,
}

impl Credentials {
    pub fn default_path() -> Result<PathBuf> {
        Ok(Config::config_dir()?.join("credentials.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        let mut creds = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read credentials file")?;
            toml::from_str::<Self>(&content).context("Failed to parse credentials file")?
        } else {
            Self::default()
        };
        creds.path = path;
        Ok(creds)
    }

    fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize credentials")?;
        write_private(&self.path, &content)
    }
}

impl TokenStore for Credentials {
    fn get_access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    fn set_access_token(&mut self, token: String) -> Result<()> {
        self.access_token = Some(token);
        self.save()
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) -> Result<()> {
        self.refresh_token = Some(token);
        self.save()
    }

    fn clear_tokens(&mut self) -> Result<()> {
        self.access_token = None;
        self.refresh_token = None;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_url_overrides_file() {
        let url = resolve_api_url(
            Some("https://api.example.com/".to_string()),
            Some("http://localhost:8000"),
        )
        .unwrap();
        assert_eq!(url, "https://api.example.com");
    }

    #[test]
    fn test_blank_env_falls_back_to_file() {
        let url = resolve_api_url(Some("  ".to_string()), Some("http://localhost:8000")).unwrap();
        assert_eq!(url, "http://localhost:8000");
    }

    #[test]
    fn test_missing_api_url_is_an_error() {
        let err = resolve_api_url(None, None).unwrap_err();
        assert!(err.to_string().contains(API_URL_ENV));
        assert!(resolve_api_url(None, Some("not a url")).is_err());
    }

    #[test]
    fn test_config_defaults_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.refresh_cookie_name(), "refresh_token");

        let config = Config {
            api_url: Some("http://localhost:8000".to_string()),
            timeout_secs: Some(5),
            refresh_cookie_name: None,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(loaded.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_credentials_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.toml");

        let mut creds = Credentials::load_from(path.clone()).unwrap();
        assert!(creds.get_access_token().is_none());
        creds.set_access_token("T1".to_string()).unwrap();
        creds.set_refresh_token("R1".to_string()).unwrap();

        let mut reloaded = Credentials::load_from(path.clone()).unwrap();
        assert_eq!(reloaded.get_access_token().as_deref(), Some("T1"));
        assert_eq!(reloaded.get_refresh_token().as_deref(), Some("R1"));

        reloaded.clear_tokens().unwrap();
        let cleared = Credentials::load_from(path.clone()).unwrap();
        assert!(cleared.get_access_token().is_none());
        assert!(cleared.get_refresh_token().is_none());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
