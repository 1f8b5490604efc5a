//! Configuration management for the Lotopital admin client.
//!
//! Loads configuration from ${LOTOPITAL_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "LOTOPITAL_API_URL";

/// How the single retry after a token refresh carries the new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryAuth {
    /// Rely on the refreshed session cookie; the returned access token is advisory.
    #[default]
    Cookie,
    /// Also send `Authorization: Bearer <access token>` on the retry.
    Bearer,
}

impl RetryAuth {
    pub fn display_name(&self) -> &'static str {
        match self {
            RetryAuth::Cookie => "cookie",
            RetryAuth::Bearer => "bearer",
        }
    }
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for configuration and data files.
    //!
    //! LOTOPITAL_HOME resolution order:
    //! 1. LOTOPITAL_HOME environment variable (if set)
    //! 2. ~/.config/lotopital (default)

    use std::path::PathBuf;

    /// Returns the Lotopital home directory.
    ///
    /// Falls back to a relative `.lotopital` directory when no home directory
    /// can be determined.
    pub fn lotopital_home() -> PathBuf {
        if let Ok(home) = std::env::var("LOTOPITAL_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".lotopital"),
            |h| h.join(".config").join("lotopital"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        lotopital_home().join("config.toml")
    }

    /// Returns the path to the persisted cookie jar.
    pub fn cookies_path() -> PathBuf {
        lotopital_home().join("cookies.json")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the site API
    pub api_url: String,

    /// Timeout for each HTTP request in seconds (0 disables)
    pub request_timeout_secs: u32,

    /// Credential carried by the retry after a refresh
    pub retry_auth: RetryAuth,

    /// Default tracing filter when LOTOPITAL_LOG is unset
    pub log_level: String,

    /// Optional log file; logs go to stderr when unset
    pub log_file: Option<String>,
}

impl Config {
    pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;
    const DEFAULT_LOG_LEVEL: &str = "warn";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the API base URL with precedence: flag > env > config.
    ///
    /// # Errors
    /// Returns an error if the winning value is not a valid URL.
    pub fn resolve_api_url(&self, flag: Option<&str>) -> Result<String> {
        let env_value = std::env::var(API_URL_ENV).ok();
        self.resolve_api_url_with(flag, env_value.as_deref())
    }

    fn resolve_api_url_with(&self, flag: Option<&str>, env_value: Option<&str>) -> Result<String> {
        let candidates = [
            (flag, "--api-url"),
            (env_value, API_URL_ENV),
            (Some(self.api_url.as_str()), "api_url"),
        ];

        for (value, source) in candidates {
            let Some(value) = value else { continue };
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            url::Url::parse(trimmed)
                .with_context(|| format!("Invalid API URL from {source}: {trimmed}"))?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }

        Ok(Self::DEFAULT_API_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves only the api_url field to a specific config file path.
    ///
    /// Creates the file from the default template if it doesn't exist.
    /// Preserves existing fields and comments using toml_edit.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_api_url_to(path: &Path, api_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let api_url = api_url.trim();
        url::Url::parse(api_url).with_context(|| format!("Invalid API URL: {api_url}"))?;

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["api_url"] = value(api_url.trim_end_matches('/'));

        Self::write_config(path, &doc.to_string())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_auth: RetryAuth::default(),
            log_level: Self::DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.api_url, Config::DEFAULT_API_URL);
        assert_eq!(config.retry_auth, RetryAuth::Cookie);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "retry_auth = \"bearer\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.retry_auth, RetryAuth::Bearer);
        assert_eq!(config.api_url, Config::DEFAULT_API_URL);
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.api_url, defaults.api_url);
        assert_eq!(config.request_timeout_secs, defaults.request_timeout_secs);
        assert_eq!(config.retry_auth, defaults.retry_auth);
        assert_eq!(config.log_level, defaults.log_level);
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_save_api_url_preserves_comments() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        Config::init(&config_path).unwrap();
        Config::save_api_url_to(&config_path, "https://api.lotopital.com/api/").unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# Base URL of the site API"));
        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.api_url, "https://api.lotopital.com/api");
    }

    #[test]
    fn test_save_api_url_rejects_invalid_url() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        assert!(Config::save_api_url_to(&config_path, "not a url").is_err());
        assert!(!config_path.exists());
    }

    #[test]
    fn test_api_url_precedence() {
        let config = Config {
            api_url: "https://config.example/api".to_string(),
            ..Default::default()
        };

        let url = config
            .resolve_api_url_with(Some("https://flag.example/api/"), Some("https://env.example"))
            .unwrap();
        assert_eq!(url, "https://flag.example/api");

        let url = config
            .resolve_api_url_with(None, Some("https://env.example"))
            .unwrap();
        assert_eq!(url, "https://env.example");

        let url = config.resolve_api_url_with(Some("  "), None).unwrap();
        assert_eq!(url, "https://config.example/api");
    }

    #[test]
    fn test_api_url_invalid_env_is_an_error() {
        let config = Config::default();
        let err = config
            .resolve_api_url_with(None, Some("::nope::"))
            .unwrap_err();
        assert!(err.to_string().contains(API_URL_ENV));
    }

    #[test]
    fn test_request_timeout_zero_disables() {
        let config = Config {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), None);
        assert_eq!(
            Config::default().request_timeout(),
            Some(Duration::from_secs(30))
        );
    }
}
