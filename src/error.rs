use std::io;
use thiserror::Error;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while analyzing a repository
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The repository reference does not match the accepted GitHub URL pattern
    #[error("Invalid GitHub repository URL: {0}")]
    InvalidRepoUrl(String),

    /// I/O errors
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The requested repository, directory or file does not exist upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// The upstream rejected the request credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// API rate limit exceeded errors
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// GitHub API specific errors
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// The fetched tree exceeded the defensive depth budget
    #[error("Repository tree exceeds maximum depth of {0}")]
    TreeTooDeep(usize),

    /// Text generation service errors (always absorbed before the caller)
    #[error("Generation error: {0}")]
    Generation(String),

    /// Cache store errors (degraded to misses / dropped writes)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// General message errors
    #[error("{0}")]
    Message(String),
}

impl AnalysisError {
    /// Creates a new error with the specified message
    pub fn new(message: &str) -> Self {
        Self::Message(message.to_string())
    }

    /// Checks if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::RateLimitExceeded(_) | Self::IO(_) | Self::Cache(_)
        )
    }

    /// Checks if this error is fatal and should terminate processing
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = AnalysisError::new("test error");
        assert!(matches!(error, AnalysisError::Message(_)));

        if let AnalysisError::Message(msg) = error {
            assert_eq!(msg, "test error");
        }
    }

    #[test]
    fn test_is_transient() {
        let transient = AnalysisError::RateLimitExceeded("403 Forbidden".into());
        let fatal = AnalysisError::InvalidRepoUrl("not-a-url".into());

        assert!(transient.is_transient());
        assert!(!fatal.is_transient());
        assert!(fatal.is_fatal());
    }
}
