#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

/// Caching of computed analysis results with TTL and cascade invalidation
pub mod cache;
/// Configuration loading and defaults
pub mod config;
/// Derivation of aggregate context from a fetched tree
pub mod context;
/// Error handling types and utilities
pub mod error;
/// Gemini text generation client with deterministic offline fallback
pub mod gemini;
/// GitHub contents API client and recursive tree fetching
pub mod github;
/// Logging configuration and utilities
pub mod logging;
/// Normalization of generation responses into fixed result shapes
pub mod parse;
/// Pipeline orchestration: the three public analysis operations
pub mod pipeline;
/// Prompt construction per analysis granularity
pub mod prompt;
/// Derived analysis status and its cache
pub mod status;

pub use cache::{CacheManager, CacheStore, Granularity, MemoryStore, RestStore};
pub use config::Config;
pub use error::{AnalysisError, Result};
pub use github::{parse_repo_url, GitHubClient, RepoItem, RepoRef};
pub use parse::{DirectoryAnalysis, FileAnalysis, RepositoryAnalysis};
pub use pipeline::{Analysis, Analyzer};
