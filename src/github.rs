//! GitHub tree fetching
//!
//! Recursively retrieves a repository's file/directory tree through the
//! contents API, downloading content only for recognized source files under
//! the size ceiling. Traversal is depth-first and strictly sequential: one
//! request per directory, plus one per qualifying file.

use crate::error::{AnalysisError, Result};
use async_recursion::async_recursion;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GITHUB_API_BASE: &str = "https://api.github.com";
const API_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("repolens/", env!("CARGO_PKG_VERSION"));

/// Maximum file size in bytes for which content is downloaded
pub const MAX_FILE_SIZE: u64 = 1_000_000;

/// Defensive ceiling on directory nesting depth
pub const MAX_TREE_DEPTH: usize = 32;

/// File extensions whose content is worth embedding in analysis prompts
const CODE_EXTENSIONS: &[&str] = &[
    ".js", ".jsx", ".ts", ".tsx", ".py", ".java", ".c", ".cpp", ".cs", ".go", ".rb", ".php",
    ".swift", ".kt", ".rs", ".dart", ".html", ".css", ".scss", ".json", ".yml", ".yaml", ".md",
    ".sql",
];

static REPO_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com/([^/\s]+)/([^/\s]+)").expect("repo url pattern")
});

/// An `{owner, repo}` pair extracted from a repository reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Owner or organization name
    pub owner: String,
    /// Repository name, with any trailing `.git` stripped
    pub repo: String,
}

/// Parses a GitHub repository URL into its `{owner, repo}` pair
///
/// Accepts any reference containing `github.com/{owner}/{repo}`; a trailing
/// `.git` suffix on the repository name is stripped. Malformed references
/// fail with [`AnalysisError::InvalidRepoUrl`] and are never retried.
pub fn parse_repo_url(url: &str) -> Result<RepoRef> {
    let captures = REPO_URL_RE
        .captures(url)
        .ok_or_else(|| AnalysisError::InvalidRepoUrl(url.to_string()))?;

    let owner = captures[1].to_string();
    let raw_repo = &captures[2];
    let repo = raw_repo.strip_suffix(".git").unwrap_or(raw_repo).to_string();

    if owner.is_empty() || repo.is_empty() {
        return Err(AnalysisError::InvalidRepoUrl(url.to_string()));
    }

    Ok(RepoRef { owner, repo })
}

/// Checks whether a file name carries a recognized source-file extension
pub fn is_code_file(name: &str) -> bool {
    let lowered = name.to_lowercase();
    CODE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// A single entry in a fetched repository tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepoItem {
    /// A file entry; `content` is present only for recognized source files
    /// under the size ceiling
    File {
        /// File name
        name: String,
        /// Path from the repository root, ancestor names joined by `/`
        path: String,
        /// Size in bytes as reported by the contents API
        size: u64,
        /// Downloaded file content, when the file qualified
        content: Option<String>,
    },
    /// A directory entry with its recursively fetched children
    Directory {
        /// Directory name
        name: String,
        /// Path from the repository root
        path: String,
        /// Child entries in API order
        children: Vec<RepoItem>,
    },
}

/// Repository metadata from `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Repository name
    pub name: String,
    /// `owner/name` form
    pub full_name: String,
    /// Optional description
    pub description: Option<String>,
    /// Primary language as reported by GitHub
    pub language: Option<String>,
    /// Star count
    pub stargazers_count: u64,
    /// Fork count
    pub forks_count: u64,
    /// Default branch name
    pub default_branch: Option<String>,
}

/// A repository's metadata together with its fetched tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedRepository {
    /// Repository metadata
    pub metadata: RepoMetadata,
    /// Root-level tree entries
    pub tree: Vec<RepoItem>,
}

/// One raw entry from the contents API listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentsEntry {
    /// Entry name
    pub name: String,
    /// Path relative to the repository root, no leading slash
    pub path: String,
    /// Size in bytes; directories report 0
    #[serde(default)]
    pub size: u64,
    /// `file` or `dir`
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw content retrieval location for file entries
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Client for the GitHub contents API
///
/// Authentication is optional: when a token is present it is attached as a
/// bearer credential, otherwise requests run unauthenticated subject to
/// GitHub's anonymous limits.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: Option<String>,
    api_base: String,
    max_file_size: u64,
    max_depth: usize,
}

impl GitHubClient {
    /// Creates a new client with an optional API token
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token,
            api_base: GITHUB_API_BASE.to_string(),
            max_file_size: MAX_FILE_SIZE,
            max_depth: MAX_TREE_DEPTH,
        })
    }

    /// Overrides the API base URL, for tests against a local mock server
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api_base = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Overrides the content size ceiling and depth budget
    pub fn with_limits(mut self, max_file_size: u64, max_depth: usize) -> Self {
        self.max_file_size = max_file_size;
        self.max_depth = max_depth;
        self
    }

    /// Fetches repository metadata together with the full recursive tree
    pub async fn fetch_repository(&self, repo: &RepoRef) -> Result<FetchedRepository> {
        let metadata = self.fetch_metadata(repo).await?;
        let tree = self.fetch_tree(repo).await?;
        Ok(FetchedRepository { metadata, tree })
    }

    /// Fetches repository metadata from `GET /repos/{owner}/{repo}`
    pub async fn fetch_metadata(&self, repo: &RepoRef) -> Result<RepoMetadata> {
        let url = format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.repo);
        let response = self.get(&url).await?;
        Ok(response.json::<RepoMetadata>().await?)
    }

    /// Recursively fetches the repository tree starting at the root
    pub async fn fetch_tree(&self, repo: &RepoRef) -> Result<Vec<RepoItem>> {
        self.fetch_contents(repo, "", "", 0).await
    }

    /// Fetches the immediate listing of one directory, without recursion
    pub async fn fetch_directory_listing(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Vec<ContentsEntry>> {
        let url = self.contents_url(repo, path);
        let response = self.get(&url).await?;
        Ok(response.json::<Vec<ContentsEntry>>().await?)
    }

    /// Fetches the content of a single file
    ///
    /// Returns `Ok(None)` when the file exceeds the size ceiling or exposes
    /// no retrieval location; the caller decides how to degrade.
    pub async fn fetch_file_content(&self, repo: &RepoRef, path: &str) -> Result<Option<String>> {
        let url = self.contents_url(repo, path);
        let response = self.get(&url).await?;
        let entry = response.json::<ContentsEntry>().await?;

        if entry.size > self.max_file_size {
            warn!(
                "File {} exceeds maximum size limit of {} bytes",
                path, self.max_file_size
            );
            return Ok(None);
        }

        let Some(download_url) = entry.download_url else {
            warn!("File {} exposes no download location", path);
            return Ok(None);
        };

        let content = self.download(&download_url).await?;
        Ok(Some(content))
    }

    #[async_recursion]
    async fn fetch_contents(
        &self,
        repo: &RepoRef,
        request_path: &str,
        display_path: &str,
        depth: usize,
    ) -> Result<Vec<RepoItem>> {
        if depth > self.max_depth {
            return Err(AnalysisError::TreeTooDeep(self.max_depth));
        }

        let url = self.contents_url(repo, request_path);
        let response = self.get(&url).await?;
        let entries = response.json::<Vec<ContentsEntry>>().await?;

        let mut result = Vec::with_capacity(entries.len());

        for entry in entries {
            let item_path = format!("{}/{}", display_path, entry.name);

            if entry.kind == "dir" {
                let children = self
                    .fetch_contents(repo, &entry.path, &item_path, depth + 1)
                    .await?;
                result.push(RepoItem::Directory {
                    name: entry.name,
                    path: item_path,
                    children,
                });
            } else if entry.kind == "file" {
                let mut content = None;
                if is_code_file(&entry.name) && entry.size < self.max_file_size {
                    if let Some(download_url) = &entry.download_url {
                        content = Some(self.download(download_url).await?);
                    }
                }

                result.push(RepoItem::File {
                    name: entry.name,
                    path: item_path,
                    size: entry.size,
                    content,
                });
            }
            // Submodules and symlinks are skipped, matching the two-shape model
        }

        Ok(result)
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> String {
        if path.is_empty() {
            format!("{}/repos/{}/{}/contents", self.api_base, repo.owner, repo.repo)
        } else {
            format!(
                "{}/repos/{}/{}/contents/{}",
                self.api_base,
                repo.owner,
                repo.repo,
                path.trim_start_matches('/')
            )
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, url));
        }

        Ok(response)
    }

    async fn download(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, url));
        }
        Ok(response.text().await?)
    }
}

fn map_status(status: StatusCode, url: &str) -> AnalysisError {
    match status {
        StatusCode::NOT_FOUND => AnalysisError::NotFound(url.to_string()),
        StatusCode::UNAUTHORIZED => AnalysisError::Unauthorized(url.to_string()),
        // GitHub signals rate limiting with 403 as well as 429
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            AnalysisError::RateLimitExceeded(format!("{} ({})", status, url))
        }
        _ => AnalysisError::GitHubApi(format!("{} ({})", status, url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_repo_url() {
        let parsed = parse_repo_url("https://github.com/acme/widget").unwrap();
        assert_eq!(
            parsed,
            RepoRef {
                owner: "acme".to_string(),
                repo: "widget".to_string()
            }
        );
    }

    #[test]
    fn test_parse_repo_url_strips_git_suffix() {
        let parsed = parse_repo_url("git@github.com/acme/widget.git").unwrap();
        assert_eq!(parsed.repo, "widget");
    }

    #[test]
    fn test_parse_repo_url_ignores_trailing_segments() {
        let parsed = parse_repo_url("https://github.com/acme/widget/tree/main/src").unwrap();
        assert_eq!(parsed.owner, "acme");
        assert_eq!(parsed.repo, "widget");
    }

    #[test]
    fn test_parse_repo_url_rejects_malformed() {
        assert!(matches!(
            parse_repo_url("https://gitlab.com/acme/widget"),
            Err(AnalysisError::InvalidRepoUrl(_))
        ));
        assert!(parse_repo_url("not a url at all").is_err());
    }

    #[test]
    fn test_is_code_file() {
        assert!(is_code_file("main.rs"));
        assert!(is_code_file("README.MD"));
        assert!(is_code_file("config.yaml"));
        assert!(!is_code_file("photo.png"));
        assert!(!is_code_file("binary"));
    }

    #[test]
    fn test_repo_item_serde_tag() {
        let item = RepoItem::File {
            name: "lib.rs".to_string(),
            path: "/src/lib.rs".to_string(),
            size: 42,
            content: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "file");

        let dir = RepoItem::Directory {
            name: "src".to_string(),
            path: "/src".to_string(),
            children: vec![item],
        };
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["type"], "directory");
        assert_eq!(json["children"][0]["type"], "file");
    }
}
