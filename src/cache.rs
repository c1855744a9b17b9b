//! Analysis result caching
//!
//! A keyed, TTL-scoped store mapping `(repository URL, granularity, path)`
//! to previously computed results. The store itself is an injected
//! collaborator behind [`CacheStore`]: either the in-memory [`MemoryStore`]
//! or a Redis-compatible REST endpoint via [`RestStore`]. Store failures
//! never surface to the pipeline: reads degrade to misses, writes are
//! dropped with a logged warning.

use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Default TTL for cached analysis results
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Scope at which an analysis result applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Whole-repository analysis
    Repository,
    /// Single-directory analysis
    Directory,
    /// Single-file analysis
    File,
}

/// Derives the cache key for a `(repository URL, granularity, path)` triple
///
/// The scheme is fixed: `repo:{url}:summary` for repositories,
/// `repo:{url}:files:{path}` for files and `repo:{url}:dirs:{path}` for
/// directories.
pub fn cache_key(repo_url: &str, granularity: Granularity, path: Option<&str>) -> String {
    match granularity {
        Granularity::Repository => format!("repo:{}:summary", repo_url),
        Granularity::File => format!("repo:{}:files:{}", repo_url, path.unwrap_or_default()),
        Granularity::Directory => format!("repo:{}:dirs:{}", repo_url, path.unwrap_or_default()),
    }
}

/// Minimal key-value surface the cache layer needs from a store
///
/// Patterns passed to `keys` use a single trailing `*` glob.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads a value; `None` on miss
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Writes a value with a TTL
    async fn set_ex(&self, key: &str, ttl: Duration, value: &str) -> Result<()>;
    /// Removes a key; removing an absent key is not an error
    async fn del(&self, key: &str) -> Result<()>;
    /// Lists keys matching a trailing-`*` glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

/// In-memory store used when no external cache endpoint is configured
///
/// Entries carry their expiry deadline and are dropped lazily on read.
/// Constructed once at startup and injected; there is no process-wide
/// singleton.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, deadline)) if Instant::now() < *deadline => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired entry: drop it under the write lock
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        let matches = entries
            .iter()
            .filter(|(_, (_, deadline))| now < *deadline)
            .map(|(key, _)| key)
            .filter(|key| match pattern.strip_suffix('*') {
                Some(prefix) => key.starts_with(prefix),
                None => key.as_str() == pattern,
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

/// Redis-compatible store spoken to over a REST endpoint
///
/// Commands are POSTed as JSON arrays (`["SETEX", key, ttl, value]`) with a
/// bearer token; responses arrive as `{"result": ...}`.
pub struct RestStore {
    client: Client,
    base_url: String,
    token: String,
}

impl RestStore {
    /// Creates a store client for the given endpoint and bearer token
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let endpoint = Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: endpoint.as_str().trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn command(&self, command: &[&str]) -> Result<Value> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(|e| AnalysisError::Cache(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Cache(format!(
                "cache endpoint returned {}",
                status
            )));
        }

        let mut envelope: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Cache(e.to_string()))?;
        Ok(envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl CacheStore for RestStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.command(&["GET", key]).await? {
            Value::String(value) => Ok(Some(value)),
            Value::Null => Ok(None),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let ttl_secs = ttl.as_secs().to_string();
        self.command(&["SETEX", key, &ttl_secs, value]).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.command(&["DEL", key]).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        match self.command(&["KEYS", pattern]).await? {
            Value::Array(values) => Ok(values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Cache manager for analysis results
///
/// Wraps an injected [`CacheStore`] with the key scheme, JSON
/// (de)serialization and the degrade-to-miss failure policy.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl CacheManager {
    /// Creates a manager over the given store with the default 24 h TTL
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Overrides the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Borrows the underlying store, for collaborators sharing it
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Checks for a cached analysis; store or decode failures degrade to a
    /// miss
    pub async fn check<T: DeserializeOwned>(
        &self,
        repo_url: &str,
        granularity: Granularity,
        path: Option<&str>,
    ) -> Option<T> {
        let key = cache_key(repo_url, granularity, path);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("Cache read failed for {}: {}", key, err);
                None
            }
        }
    }

    /// Stores an analysis result; failures are dropped with a warning
    pub async fn store_result<T: Serialize>(
        &self,
        repo_url: &str,
        granularity: Granularity,
        value: &T,
        path: Option<&str>,
        ttl: Option<Duration>,
    ) {
        let key = cache_key(repo_url, granularity, path);
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("Failed to serialize cache entry {}: {}", key, err);
                return;
            }
        };

        if let Err(err) = self
            .store
            .set_ex(&key, ttl.unwrap_or(self.default_ttl), &serialized)
            .await
        {
            warn!("Cache write failed for {}: {}", key, err);
        }
    }

    /// Invalidates cache entries for a repository
    ///
    /// With no granularity, every key under the repository prefix is
    /// removed. Invalidating a directory additionally removes every file
    /// key nested under that directory path (cascade invalidation).
    pub async fn invalidate(
        &self,
        repo_url: &str,
        granularity: Option<Granularity>,
        path: Option<&str>,
    ) -> Result<()> {
        match (granularity, path) {
            (None, _) => {
                let pattern = format!("repo:{}:*", repo_url);
                self.del_matching(&pattern).await?;
            }
            (Some(Granularity::Repository), _) => {
                self.store
                    .del(&cache_key(repo_url, Granularity::Repository, None))
                    .await?;
            }
            (Some(Granularity::File), Some(path)) => {
                self.store
                    .del(&cache_key(repo_url, Granularity::File, Some(path)))
                    .await?;
            }
            (Some(Granularity::Directory), Some(path)) => {
                self.store
                    .del(&cache_key(repo_url, Granularity::Directory, Some(path)))
                    .await?;
                let pattern = format!("repo:{}:files:{}/*", repo_url, path);
                self.del_matching(&pattern).await?;
            }
            // file/directory invalidation without a path has nothing to do
            (Some(_), None) => {}
        }
        Ok(())
    }

    async fn del_matching(&self, pattern: &str) -> Result<()> {
        for key in self.store.keys(pattern).await? {
            self.store.del(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_scheme() {
        let url = "https://github.com/acme/widget";
        assert_eq!(
            cache_key(url, Granularity::Repository, None),
            "repo:https://github.com/acme/widget:summary"
        );
        assert_eq!(
            cache_key(url, Granularity::File, Some("src/lib.rs")),
            "repo:https://github.com/acme/widget:files:src/lib.rs"
        );
        assert_eq!(
            cache_key(url, Granularity::Directory, Some("src")),
            "repo:https://github.com/acme/widget:dirs:src"
        );
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_expiry() {
        let store = MemoryStore::new();
        store
            .set_ex("k", Duration::from_secs(60), "v")
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.set_ex("gone", Duration::from_millis(1), "v").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.get("gone").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_glob() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set_ex("repo:u:files:src/a.rs", ttl, "1").await.unwrap();
        store.set_ex("repo:u:files:lib/b.rs", ttl, "2").await.unwrap();

        let mut keys = store.keys("repo:u:files:src/*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["repo:u:files:src/a.rs".to_string()]);

        let exact = store.keys("repo:u:files:lib/b.rs").await.unwrap();
        assert_eq!(exact.len(), 1);
    }
}
