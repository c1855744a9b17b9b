use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Main configuration struct for the application
///
/// Holds API credentials, fetch limits and cache TTL settings. Credentials
/// are optional: without a GitHub token requests run unauthenticated, and
/// without a Gemini key the generation client uses its offline fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// GitHub API token for authenticated requests
    pub github_token: Option<String>,
    /// Gemini API key for the text generation service
    pub gemini_api_key: Option<String>,
    /// REST endpoint of the Redis-compatible cache store
    pub redis_url: Option<String>,
    /// Bearer token for the cache store endpoint
    pub redis_token: Option<String>,
    /// Limits applied while fetching repository trees
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Cache TTL settings
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Limits applied while fetching repository trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum file size in bytes for which content is downloaded
    pub max_file_size: u64,
    /// Maximum directory nesting depth before traversal is aborted
    pub max_depth: usize,
}

/// Cache TTL settings, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long computed analysis results stay cached
    pub analysis_ttl_secs: u64,
    /// How long derived analysis statuses stay cached
    pub status_ttl_secs: u64,
}

impl Config {
    /// Builds a configuration from environment variables only
    pub fn from_env() -> Self {
        Self {
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            redis_token: std::env::var("REDIS_TOKEN").ok(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Loads configuration from the default config file location
    ///
    /// If the config file doesn't exist, falls back to environment-only
    /// configuration. The config file is expected to be in TOML format;
    /// environment variables override file values for credentials.
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AnalysisError::Config("Could not find config directory".into()))?;
        let config_path = config_dir.join("repolens").join("config.toml");

        if !config_path.exists() {
            return Ok(Self::from_env());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| AnalysisError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| AnalysisError::Config(format!("Failed to parse config file: {}", e)))?;

        // Environment wins over the file for credentials
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            config.github_token = Some(token);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.gemini_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = Some(url);
        }
        if let Ok(token) = std::env::var("REDIS_TOKEN") {
            config.redis_token = Some(token);
        }

        Ok(config)
    }

    /// Validates that the configured credentials are usable
    pub fn validate(&self) -> Result<()> {
        if let Some(token) = &self.github_token {
            if token.trim().is_empty() {
                return Err(AnalysisError::new("GitHub token is empty"));
            }
        }
        if self.redis_url.is_some() && self.redis_token.is_none() {
            return Err(AnalysisError::new("redis_url is set but redis_token is missing"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            gemini_api_key: None,
            redis_url: None,
            redis_token: None,
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1_000_000,
            max_depth: 32,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            analysis_ttl_secs: 86_400,
            status_ttl_secs: 3_600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetch.max_file_size, 1_000_000);
        assert_eq!(config.cache.analysis_ttl_secs, 86_400);
        assert_eq!(config.cache.status_ttl_secs, 3_600);
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let config = Config {
            github_token: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str("github_token = \"abc\"").unwrap();
        assert_eq!(config.github_token.as_deref(), Some("abc"));
        assert_eq!(config.fetch.max_depth, 32);
    }
}
