//! Analysis pipeline orchestration
//!
//! Composes the tree fetcher, context builder, prompt composer, generation
//! client and response normalizer into the three public operations. Each
//! operation consults the cache before recomputing and writes back after.
//! There is no intermediate durable state: a crash mid-pipeline means the
//! next call recomputes. Concurrent invocations for the same key race
//! benignly, last cache write wins.

use crate::cache::{CacheManager, Granularity, MemoryStore, RestStore};
use crate::config::Config;
use crate::context::build_context;
use crate::error::Result;
use crate::gemini::GeminiClient;
use crate::github::{parse_repo_url, GitHubClient};
use crate::parse::{
    parse_directory_response, parse_file_response, parse_repository_response, DirectoryAnalysis,
    FileAnalysis, RepositoryAnalysis,
};
use crate::prompt::{directory_prompt, file_prompt, repository_prompt};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A completed analysis with its identity and timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis<T> {
    /// Identifier minted for this analysis
    pub id: Uuid,
    /// When the result was produced (or served from cache)
    pub analyzed_at: DateTime<Utc>,
    /// The repository reference that was analyzed
    pub repo_url: String,
    /// Directory or file path, for the narrower granularities
    pub path: Option<String>,
    /// The granularity-specific result
    pub result: T,
}

impl<T> Analysis<T> {
    fn new(repo_url: &str, path: Option<&str>, result: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyzed_at: Utc::now(),
            repo_url: repo_url.to_string(),
            path: path.map(str::to_string),
            result,
        }
    }
}

/// The analysis pipeline orchestrator
///
/// Holds the collaborators injected at startup; no global state is shared
/// across calls except the cache store itself.
#[derive(Clone)]
pub struct Analyzer {
    github: GitHubClient,
    gemini: GeminiClient,
    cache: CacheManager,
}

impl Analyzer {
    /// Creates an analyzer from explicit collaborators
    pub fn new(github: GitHubClient, gemini: GeminiClient, cache: CacheManager) -> Self {
        Self {
            github,
            gemini,
            cache,
        }
    }

    /// Builds an analyzer from configuration
    ///
    /// Uses the REST cache store when an endpoint is configured, otherwise
    /// falls back to the in-memory store with a warning.
    pub fn from_config(config: &Config) -> Result<Self> {
        let github = GitHubClient::new(config.github_token.clone())?
            .with_limits(config.fetch.max_file_size, config.fetch.max_depth);
        let gemini = GeminiClient::new(config.gemini_api_key.clone())?;

        let cache = match (&config.redis_url, &config.redis_token) {
            (Some(url), Some(token)) => CacheManager::new(Arc::new(RestStore::new(url, token)?)),
            _ => {
                warn!("No cache endpoint configured, using in-memory store");
                CacheManager::new(Arc::new(MemoryStore::new()))
            }
        }
        .with_default_ttl(Duration::from_secs(config.cache.analysis_ttl_secs));

        Ok(Self::new(github, gemini, cache))
    }

    /// Borrows the cache manager, for invalidation and status collaborators
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Analyzes a whole repository
    ///
    /// Fatal errors only arise from reference parsing and the tree
    /// transport; generation and normalization degrade internally.
    pub async fn analyze_repository(&self, repo_url: &str) -> Result<Analysis<RepositoryAnalysis>> {
        let repo = parse_repo_url(repo_url)?;

        if let Some(hit) = self
            .cache
            .check::<RepositoryAnalysis>(repo_url, Granularity::Repository, None)
            .await
        {
            info!("Cache hit for repository {}", repo_url);
            return Ok(Analysis::new(repo_url, None, hit));
        }

        info!("Analyzing repository {}/{}", repo.owner, repo.repo);
        let fetched = self.github.fetch_repository(&repo).await?;
        let context = build_context(&fetched.tree);
        let prompt = repository_prompt(Some(&fetched.metadata), &context);
        let text = self.gemini.generate(&prompt).await;
        let result = parse_repository_response(&text);

        self.cache
            .store_result(repo_url, Granularity::Repository, &result, None, None)
            .await;

        Ok(Analysis::new(repo_url, None, result))
    }

    /// Analyzes a single directory within a repository
    pub async fn analyze_directory(
        &self,
        repo_url: &str,
        path: &str,
    ) -> Result<Analysis<DirectoryAnalysis>> {
        let repo = parse_repo_url(repo_url)?;

        if let Some(hit) = self
            .cache
            .check::<DirectoryAnalysis>(repo_url, Granularity::Directory, Some(path))
            .await
        {
            info!("Cache hit for directory {}:{}", repo_url, path);
            return Ok(Analysis::new(repo_url, Some(path), hit));
        }

        info!("Analyzing directory {} in {}/{}", path, repo.owner, repo.repo);
        let listing = self.github.fetch_directory_listing(&repo, path).await?;
        let prompt = directory_prompt(path, &listing);
        let text = self.gemini.generate(&prompt).await;
        let result = parse_directory_response(&text, path);

        self.cache
            .store_result(repo_url, Granularity::Directory, &result, Some(path), None)
            .await;

        Ok(Analysis::new(repo_url, Some(path), result))
    }

    /// Analyzes a single file within a repository
    ///
    /// A file whose content cannot be retrieved (over the size ceiling, or
    /// no download location) yields a default result explaining that, not
    /// an error; the result is not cached so a later retry can succeed.
    pub async fn analyze_file(&self, repo_url: &str, path: &str) -> Result<Analysis<FileAnalysis>> {
        let repo = parse_repo_url(repo_url)?;

        if let Some(hit) = self
            .cache
            .check::<FileAnalysis>(repo_url, Granularity::File, Some(path))
            .await
        {
            info!("Cache hit for file {}:{}", repo_url, path);
            return Ok(Analysis::new(repo_url, Some(path), hit));
        }

        info!("Analyzing file {} in {}/{}", path, repo.owner, repo.repo);
        let Some(content) = self.github.fetch_file_content(&repo, path).await? else {
            warn!("Content for {} unavailable, returning default analysis", path);
            let result = FileAnalysis {
                summary: format!("File {} could not be retrieved for analysis", path),
                ..FileAnalysis::default()
            };
            return Ok(Analysis::new(repo_url, Some(path), result));
        };

        let prompt = file_prompt(path, &content);
        let text = self.gemini.generate(&prompt).await;
        let result = parse_file_response(&text, path);

        self.cache
            .store_result(repo_url, Granularity::File, &result, Some(path), None)
            .await;

        Ok(Analysis::new(repo_url, Some(path), result))
    }

    /// Invalidates cached results for a repository
    ///
    /// See [`CacheManager::invalidate`] for the cascade rules.
    pub async fn invalidate(
        &self,
        repo_url: &str,
        granularity: Option<Granularity>,
        path: Option<&str>,
    ) -> Result<()> {
        self.cache.invalidate(repo_url, granularity, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    fn analyzer() -> Analyzer {
        Analyzer::from_config(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_bad_reference_is_fatal() {
        let result = analyzer().analyze_repository("https://example.com/foo").await;
        assert!(matches!(result, Err(AnalysisError::InvalidRepoUrl(_))));
    }

    #[test]
    fn test_analysis_wrapper_mints_identity() {
        let a = Analysis::new("https://github.com/acme/widget", Some("src"), ());
        let b = Analysis::new("https://github.com/acme/widget", Some("src"), ());
        assert_ne!(a.id, b.id);
        assert_eq!(a.path.as_deref(), Some("src"));
    }
}
