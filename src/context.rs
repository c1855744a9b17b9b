//! Aggregate context derivation
//!
//! Pure functions that turn a fetched repository tree into the facts the
//! repository prompt embeds: language distribution, recognized key files,
//! code statistics and a content-free simplified tree. No I/O happens here.

use crate::github::RepoItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category assigned to a recognized key file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFileCategory {
    /// Dependency manifests (package.json, Cargo.toml, ...)
    Dependency,
    /// Project documentation (README)
    Documentation,
    /// License files
    License,
    /// Build and tool configuration
    Configuration,
}

/// Fixed catalog of file names recognized as key files, matched
/// case-insensitively against exact names
const KEY_FILE_CATALOG: &[(&str, KeyFileCategory)] = &[
    ("package.json", KeyFileCategory::Dependency),
    ("requirements.txt", KeyFileCategory::Dependency),
    ("Gemfile", KeyFileCategory::Dependency),
    ("pom.xml", KeyFileCategory::Dependency),
    ("build.gradle", KeyFileCategory::Dependency),
    ("Cargo.toml", KeyFileCategory::Dependency),
    ("go.mod", KeyFileCategory::Dependency),
    ("README.md", KeyFileCategory::Documentation),
    ("LICENSE", KeyFileCategory::License),
    (".gitignore", KeyFileCategory::Configuration),
    ("Dockerfile", KeyFileCategory::Configuration),
    ("docker-compose.yml", KeyFileCategory::Configuration),
    (".env.example", KeyFileCategory::Configuration),
    ("tsconfig.json", KeyFileCategory::Configuration),
    (".eslintrc", KeyFileCategory::Configuration),
    (".prettierrc", KeyFileCategory::Configuration),
    ("next.config.js", KeyFileCategory::Configuration),
    ("nuxt.config.js", KeyFileCategory::Configuration),
    ("angular.json", KeyFileCategory::Configuration),
    ("svelte.config.js", KeyFileCategory::Configuration),
];

/// Share of files carrying one extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageShare {
    /// Lowercased file extension, without the dot
    pub language: String,
    /// `round(count / totalFiles * 100)`; shares are not normalized, so the
    /// column may sum to 99 or 101
    pub percentage: u32,
}

/// A recognized key file and where it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    /// File name as it appears in the tree
    pub name: String,
    /// Path from the repository root
    pub path: String,
    /// Why this file matters
    pub category: KeyFileCategory,
}

/// Per-extension breakdown within [`CodeStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStat {
    /// Lowercased file extension
    pub language: String,
    /// Number of files
    pub files: u64,
    /// Total line count across those files
    pub lines: u64,
    /// Total size in bytes
    pub size: u64,
    /// Share of all files, rounded
    pub percentage: u32,
}

/// Aggregate counts over a fetched tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeStats {
    /// Total number of files
    pub total_files: u64,
    /// Total number of directories
    pub total_directories: u64,
    /// Total line count, over files whose content was retrieved
    pub total_lines: u64,
    /// Total byte size across all files
    pub total_size: u64,
    /// Per-extension breakdown, sorted by file count descending
    pub language_stats: Vec<LanguageStat>,
}

/// Content-free projection of a [`RepoItem`], used to keep prompts bounded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SimplifiedItem {
    /// File with name, path and size only
    File {
        /// File name
        name: String,
        /// Path from the repository root
        path: String,
        /// Size in bytes
        size: u64,
    },
    /// Directory with recursively simplified children
    Directory {
        /// Directory name
        name: String,
        /// Path from the repository root
        path: String,
        /// Simplified children
        children: Vec<SimplifiedItem>,
    },
}

/// Everything the repository prompt needs to know about a tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Language distribution, descending by share
    pub languages: Vec<LanguageShare>,
    /// Recognized key files
    pub key_files: Vec<KeyFile>,
    /// Aggregate statistics
    pub stats: CodeStats,
    /// Size-reduced tree projection
    pub structure: Vec<SimplifiedItem>,
}

/// Derives the full [`AnalysisContext`] for a fetched tree
pub fn build_context(tree: &[RepoItem]) -> AnalysisContext {
    AnalysisContext {
        languages: detect_languages(tree),
        key_files: find_key_files(tree),
        stats: calculate_code_stats(tree),
        structure: simplify_structure(tree),
    }
}

/// Counts files per lowercased extension and converts to rounded shares
///
/// Only files whose name contains a `.` participate. Shares are sorted
/// descending; ties break alphabetically for determinism.
pub fn detect_languages(tree: &[RepoItem]) -> Vec<LanguageShare> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut total_files: u64 = 0;

    fn walk(items: &[RepoItem], counts: &mut HashMap<String, u64>, total: &mut u64) {
        for item in items {
            match item {
                RepoItem::File { name, .. } => {
                    if let Some(extension) = extension_of(name) {
                        *counts.entry(extension).or_insert(0) += 1;
                        *total += 1;
                    }
                }
                RepoItem::Directory { children, .. } => walk(children, counts, total),
            }
        }
    }
    walk(tree, &mut counts, &mut total_files);

    if total_files == 0 {
        return Vec::new();
    }

    let mut languages: Vec<LanguageShare> = counts
        .into_iter()
        .map(|(language, count)| LanguageShare {
            language,
            percentage: rounded_share(count, total_files),
        })
        .collect();

    languages.sort_by(|a, b| {
        b.percentage
            .cmp(&a.percentage)
            .then_with(|| a.language.cmp(&b.language))
    });
    languages
}

/// Finds files whose exact name matches the key-file catalog
pub fn find_key_files(tree: &[RepoItem]) -> Vec<KeyFile> {
    let mut found = Vec::new();

    fn walk(items: &[RepoItem], found: &mut Vec<KeyFile>) {
        for item in items {
            match item {
                RepoItem::File { name, path, .. } => {
                    let matched = KEY_FILE_CATALOG
                        .iter()
                        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name));
                    if let Some((_, category)) = matched {
                        found.push(KeyFile {
                            name: name.clone(),
                            path: path.clone(),
                            category: *category,
                        });
                    }
                }
                RepoItem::Directory { children, .. } => walk(children, found),
            }
        }
    }
    walk(tree, &mut found);
    found
}

/// Computes aggregate counts and a per-extension breakdown
///
/// Line counts come from newline-splitting and exist only for files whose
/// content was retrieved; the per-extension breakdown likewise only tracks
/// files with retrieved content.
pub fn calculate_code_stats(tree: &[RepoItem]) -> CodeStats {
    let mut stats = CodeStats::default();
    let mut by_extension: HashMap<String, (u64, u64, u64)> = HashMap::new();

    fn walk(
        items: &[RepoItem],
        stats: &mut CodeStats,
        by_extension: &mut HashMap<String, (u64, u64, u64)>,
    ) {
        for item in items {
            match item {
                RepoItem::File {
                    name,
                    size,
                    content,
                    ..
                } => {
                    stats.total_files += 1;
                    stats.total_size += size;

                    if let Some(content) = content {
                        let lines = content.split('\n').count() as u64;
                        stats.total_lines += lines;

                        if let Some(extension) = extension_of(name) {
                            let entry = by_extension.entry(extension).or_insert((0, 0, 0));
                            entry.0 += 1;
                            entry.1 += lines;
                            entry.2 += size;
                        }
                    }
                }
                RepoItem::Directory { children, .. } => {
                    stats.total_directories += 1;
                    walk(children, stats, by_extension);
                }
            }
        }
    }
    walk(tree, &mut stats, &mut by_extension);

    let total_files = stats.total_files;
    let mut language_stats: Vec<LanguageStat> = by_extension
        .into_iter()
        .map(|(language, (files, lines, size))| LanguageStat {
            language,
            files,
            lines,
            size,
            percentage: rounded_share(files, total_files),
        })
        .collect();
    language_stats.sort_by(|a, b| b.files.cmp(&a.files).then_with(|| a.language.cmp(&b.language)));
    stats.language_stats = language_stats;

    stats
}

/// Projects the tree into its content-free shape
pub fn simplify_structure(tree: &[RepoItem]) -> Vec<SimplifiedItem> {
    tree.iter()
        .map(|item| match item {
            RepoItem::File {
                name, path, size, ..
            } => SimplifiedItem::File {
                name: name.clone(),
                path: path.clone(),
                size: *size,
            },
            RepoItem::Directory {
                name,
                path,
                children,
            } => SimplifiedItem::Directory {
                name: name.clone(),
                path: path.clone(),
                children: simplify_structure(children),
            },
        })
        .collect()
}

// A trailing dot yields no extension rather than an empty one
fn extension_of(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext.to_lowercase()),
        _ => None,
    }
}

fn rounded_share(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file(name: &str, path: &str, size: u64, content: Option<&str>) -> RepoItem {
        RepoItem::File {
            name: name.to_string(),
            path: path.to_string(),
            size,
            content: content.map(|c| c.to_string()),
        }
    }

    fn dir(name: &str, path: &str, children: Vec<RepoItem>) -> RepoItem {
        RepoItem::Directory {
            name: name.to_string(),
            path: path.to_string(),
            children,
        }
    }

    #[test]
    fn test_detect_languages_rounded_shares() {
        let tree = vec![
            file("a.ts", "/a.ts", 10, None),
            file("b.ts", "/b.ts", 10, None),
            file("README.md", "/README.md", 5, None),
        ];
        let languages = detect_languages(&tree);
        assert_eq!(
            languages,
            vec![
                LanguageShare {
                    language: "ts".to_string(),
                    percentage: 67
                },
                LanguageShare {
                    language: "md".to_string(),
                    percentage: 33
                },
            ]
        );
    }

    #[test]
    fn test_detect_languages_counts_sum_to_total() {
        let tree = vec![
            file("a.rs", "/a.rs", 1, None),
            file("b.py", "/b.py", 1, None),
            file("c.py", "/c.py", 1, None),
            file("no_extension", "/no_extension", 1, None),
            dir("src", "/src", vec![file("d.rs", "/src/d.rs", 1, None)]),
        ];
        let languages = detect_languages(&tree);
        // one entry per distinct extension, extensionless files excluded
        assert_eq!(languages.len(), 2);
        assert!(languages.iter().all(|l| l.language == "rs" || l.language == "py"));
    }

    #[test]
    fn test_trailing_dot_is_not_an_extension() {
        let tree = vec![
            file("file.", "/file.", 1, Some("x")),
            file("a.rs", "/a.rs", 1, None),
        ];

        let languages = detect_languages(&tree);
        assert_eq!(languages.len(), 1);
        assert_eq!(languages[0].language, "rs");
        assert_eq!(languages[0].percentage, 100);

        // the dot-terminated file still counts toward totals, but never
        // under an empty-string language
        let stats = calculate_code_stats(&tree);
        assert_eq!(stats.total_files, 2);
        assert!(stats.language_stats.is_empty());
    }

    #[test]
    fn test_find_key_files_case_insensitive() {
        let tree = vec![
            file("readme.md", "/readme.md", 10, None),
            dir(
                "app",
                "/app",
                vec![file("package.json", "/app/package.json", 20, None)],
            ),
        ];
        let key_files = find_key_files(&tree);
        assert_eq!(key_files.len(), 2);
        assert_eq!(key_files[0].category, KeyFileCategory::Documentation);
        assert_eq!(key_files[1].category, KeyFileCategory::Dependency);
        assert_eq!(key_files[1].path, "/app/package.json");
    }

    #[test]
    fn test_calculate_code_stats() {
        let tree = vec![
            file("main.rs", "/main.rs", 100, Some("fn main() {}\n// done")),
            file("data.bin", "/data.bin", 500, None),
            dir("src", "/src", vec![file("lib.rs", "/src/lib.rs", 50, Some("pub fn f() {}"))]),
        ];
        let stats = calculate_code_stats(&tree);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_directories, 1);
        assert_eq!(stats.total_size, 650);
        assert_eq!(stats.total_lines, 3); // 2 + 1
        assert_eq!(stats.language_stats.len(), 1);
        assert_eq!(stats.language_stats[0].language, "rs");
        assert_eq!(stats.language_stats[0].files, 2);
        assert_eq!(stats.language_stats[0].percentage, 67);
    }

    #[test]
    fn test_simplify_structure_drops_content() {
        let tree = vec![dir(
            "src",
            "/src",
            vec![file("lib.rs", "/src/lib.rs", 50, Some("pub fn f() {}"))],
        )];
        let simplified = simplify_structure(&tree);
        let json = serde_json::to_string(&simplified).unwrap();
        assert!(!json.contains("pub fn f"));
        assert!(json.contains("\"path\":\"/src/lib.rs\""));
    }
}
