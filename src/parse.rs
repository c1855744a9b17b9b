//! Response normalization
//!
//! The generation service answers with anything from a fenced JSON block to
//! free prose. The parsers here turn that text into fully-populated result
//! structures and never fail the caller: structured data is used when it
//! deserializes, a numbered-prose heuristic fills in positionally when it
//! does not, and as a last resort the whole text becomes the summary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static JSON_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*\n(.*?)\n\s*```").expect("json fence pattern"));
static ANY_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*\n(.*?)\n\s*```").expect("fence pattern"));
static BRACE_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("brace span pattern"));
static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\d+\.\s+").expect("numbered item pattern"));
static FEATURE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[•\-*]?\s*([^:\n]+):\s*(.+)$").expect("feature pattern"));

/// A named feature with its description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name
    pub name: String,
    /// Feature description
    pub description: String,
}

/// A notable entry and its one-line summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Path of the entry
    pub path: String,
    /// Summary text
    pub summary: String,
}

/// A potential issue flagged in a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue category
    #[serde(rename = "type")]
    pub kind: String,
    /// Issue description
    pub description: String,
}

/// Repository-granularity analysis result; every field has a non-null
/// default even on parse failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
    /// Overall summary
    #[serde(default)]
    pub summary: String,
    /// Named features
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Architecture assessment (pattern, components, description, ...)
    #[serde(default)]
    pub architecture: Map<String, Value>,
    /// Code quality assessment (complexity, quality, maintainability, ...)
    #[serde(default, rename = "codeStats")]
    pub code_stats: Map<String, Value>,
    /// Notable entries with summaries
    #[serde(default)]
    pub items: Vec<ItemSummary>,
}

/// File-granularity analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Summary of the file
    #[serde(default)]
    pub summary: String,
    /// Key features keyed by name
    #[serde(default)]
    pub features: Map<String, Value>,
    /// Estimated complexity in `[0, 1]`; 0.5 when the service did not
    /// provide a usable number
    #[serde(default = "default_complexity")]
    pub complexity: f64,
    /// Functions found in the file
    #[serde(default)]
    pub functions: Vec<Feature>,
    /// Imports or dependencies used
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Potential issues
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// Directory-granularity analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryAnalysis {
    /// Summary of the directory's purpose
    #[serde(default)]
    pub summary: String,
    /// Key features keyed by name
    #[serde(default)]
    pub features: Map<String, Value>,
    /// Structure description and key components
    #[serde(default)]
    pub structure: Map<String, Value>,
    /// Key dependencies or relationships
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Potential improvements
    #[serde(default)]
    pub recommendations: Vec<String>,
}

fn default_complexity() -> f64 {
    0.5
}

impl Default for FileAnalysis {
    fn default() -> Self {
        Self {
            summary: String::new(),
            features: Map::new(),
            complexity: default_complexity(),
            functions: Vec::new(),
            dependencies: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// Locates the structured span within generated text
///
/// Preference order: a fence explicitly tagged `json`, any generic fence,
/// then the first top-level brace-delimited span.
pub fn extract_json_block(text: &str) -> Option<String> {
    if let Some(caps) = JSON_FENCE_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = ANY_FENCE_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    BRACE_SPAN_RE.find(text).map(|m| m.as_str().to_string())
}

/// Parses a repository-granularity response; never fails
pub fn parse_repository_response(text: &str) -> RepositoryAnalysis {
    if let Some(block) = extract_json_block(text) {
        return match serde_json::from_str::<Value>(&block) {
            Ok(value) => repository_from_value(&value),
            // A structured span that does not deserialize is a parse
            // failure, not a prose response
            Err(_) => RepositoryAnalysis {
                summary: "Failed to parse analysis response".to_string(),
                architecture: description_map("Analysis parsing error"),
                ..RepositoryAnalysis::default()
            },
        };
    }

    let sections = split_numbered(text);
    if sections.len() >= 4 {
        return RepositoryAnalysis {
            summary: sections[0].clone(),
            features: parse_feature_list(&sections[1]),
            architecture: description_map(&sections[2]),
            code_stats: description_map(&sections[3]),
            items: Vec::new(),
        };
    }

    RepositoryAnalysis {
        summary: text.trim().to_string(),
        architecture: description_map("Analysis could not be structured properly"),
        ..RepositoryAnalysis::default()
    }
}

/// Parses a file-granularity response; never fails
pub fn parse_file_response(text: &str, path: &str) -> FileAnalysis {
    if let Some(block) = extract_json_block(text) {
        return match serde_json::from_str::<Value>(&block) {
            Ok(value) => file_from_value(&value, path),
            Err(_) => FileAnalysis {
                summary: format!("Failed to parse analysis for {}", path),
                ..FileAnalysis::default()
            },
        };
    }

    let sections = split_numbered(text);
    if sections.len() >= 2 {
        return FileAnalysis {
            summary: sections[0].clone(),
            features: description_map(&sections[1]),
            ..FileAnalysis::default()
        };
    }

    FileAnalysis {
        summary: text.trim().to_string(),
        ..FileAnalysis::default()
    }
}

/// Parses a directory-granularity response; never fails
pub fn parse_directory_response(text: &str, path: &str) -> DirectoryAnalysis {
    if let Some(block) = extract_json_block(text) {
        return match serde_json::from_str::<Value>(&block) {
            Ok(value) => directory_from_value(&value, path),
            Err(_) => DirectoryAnalysis {
                summary: format!("Failed to parse analysis for {}", path),
                ..DirectoryAnalysis::default()
            },
        };
    }

    let sections = split_numbered(text);
    if sections.len() >= 2 {
        return DirectoryAnalysis {
            summary: sections[0].clone(),
            features: description_map(&sections[1]),
            ..DirectoryAnalysis::default()
        };
    }

    DirectoryAnalysis {
        summary: text.trim().to_string(),
        ..DirectoryAnalysis::default()
    }
}

fn repository_from_value(value: &Value) -> RepositoryAnalysis {
    RepositoryAnalysis {
        summary: string_field(value, "summary", "No summary provided"),
        features: typed_field(value, "features"),
        architecture: map_field(value, "architecture")
            .unwrap_or_else(|| description_map("No architecture details provided")),
        code_stats: map_field(value, "codeStats").unwrap_or_default(),
        items: typed_field(value, "items"),
    }
}

fn file_from_value(value: &Value, path: &str) -> FileAnalysis {
    FileAnalysis {
        summary: string_field(value, "summary", &format!("Analysis of {}", path)),
        features: map_field(value, "features").unwrap_or_default(),
        complexity: value
            .get("complexity")
            .and_then(Value::as_f64)
            .unwrap_or_else(default_complexity),
        functions: typed_field(value, "functions"),
        dependencies: typed_field(value, "dependencies"),
        issues: typed_field(value, "issues"),
    }
}

fn directory_from_value(value: &Value, path: &str) -> DirectoryAnalysis {
    DirectoryAnalysis {
        summary: string_field(value, "summary", &format!("Analysis of {}", path)),
        features: map_field(value, "features").unwrap_or_default(),
        structure: map_field(value, "structure").unwrap_or_default(),
        dependencies: typed_field(value, "dependencies"),
        recommendations: typed_field(value, "recommendations"),
    }
}

fn string_field(value: &Value, key: &str, default: &str) -> String {
    match value.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => default.to_string(),
    }
}

fn map_field(value: &Value, key: &str) -> Option<Map<String, Value>> {
    value.get(key).and_then(Value::as_object).cloned()
}

fn typed_field<T: serde::de::DeserializeOwned + Default>(value: &Value, key: &str) -> T {
    value
        .get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn description_map(description: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "description".to_string(),
        Value::String(description.trim().to_string()),
    );
    map
}

/// Splits prose on numbered list items and drops empty segments
fn split_numbered(text: &str) -> Vec<String> {
    NUMBERED_RE
        .split(text)
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts `name: description` features from a prose segment
///
/// Falls back to treating each non-empty line as a feature named after
/// itself when no colon-delimited pairs are present.
pub fn parse_feature_list(text: &str) -> Vec<Feature> {
    let mut features: Vec<Feature> = FEATURE_LINE_RE
        .captures_iter(text)
        .map(|caps| Feature {
            name: caps[1].trim_matches(['•', '-', '*', ' ']).to_string(),
            description: caps[2].trim().to_string(),
        })
        .filter(|feature| !feature.name.is_empty())
        .collect();

    if features.is_empty() {
        features = text
            .lines()
            .map(|line| line.trim().trim_start_matches(['•', '-', '*']).trim())
            .filter(|line| !line.is_empty())
            .map(|line| Feature {
                name: line.to_string(),
                description: line.to_string(),
            })
            .collect();
    }

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fenced_json_exact_mapping() {
        let text = "Here is the analysis:\n```json\n{\"summary\":\"X\",\"features\":[{\"name\":\"A\",\"description\":\"B\"}]}\n```\nDone.";
        let result = parse_repository_response(text);
        assert_eq!(result.summary, "X");
        assert_eq!(
            result.features,
            vec![Feature {
                name: "A".to_string(),
                description: "B".to_string()
            }]
        );
        // defaults applied only to absent fields
        assert_eq!(
            result.architecture.get("description").and_then(Value::as_str),
            Some("No architecture details provided")
        );
        assert!(result.code_stats.is_empty());
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_generic_fence_and_bare_braces() {
        let fenced = "```\n{\"summary\":\"from fence\"}\n```";
        assert_eq!(parse_repository_response(fenced).summary, "from fence");

        let bare = "Intro {\"summary\":\"from braces\"} outro";
        assert_eq!(parse_repository_response(bare).summary, "from braces");
    }

    #[test]
    fn test_malformed_json_block_is_a_parse_failure() {
        let text = "```json\n{not valid json at all\n}\n```";
        let result = parse_repository_response(text);
        assert_eq!(result.summary, "Failed to parse analysis response");
        assert_eq!(
            result.architecture.get("description").and_then(Value::as_str),
            Some("Analysis parsing error")
        );
    }

    #[test]
    fn test_numbered_sections_positional_mapping() {
        let text = "\n1. The overall summary.\n2. auth: login handling\n3. Layered architecture.\n4. Moderate complexity.";
        let result = parse_repository_response(text);
        assert_eq!(result.summary, "The overall summary.");
        assert_eq!(result.features[0].name, "auth");
        assert_eq!(
            result.architecture.get("description").and_then(Value::as_str),
            Some("Layered architecture.")
        );
        assert_eq!(
            result.code_stats.get("description").and_then(Value::as_str),
            Some("Moderate complexity.")
        );
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_too_few_sections_falls_back_to_whole_text() {
        let text = "\n1. Only one section here.";
        let result = parse_repository_response(text);
        assert_eq!(result.summary, "1. Only one section here.");
        assert!(result.features.is_empty());
    }

    #[test]
    fn test_empty_text_still_fully_populated() {
        let result = parse_repository_response("");
        assert_eq!(result.summary, "");
        assert!(result.features.is_empty());
        assert!(!result.architecture.is_empty());

        let file = parse_file_response("", "/a.rs");
        assert_eq!(file.complexity, 0.5);

        let dir = parse_directory_response("", "/src");
        assert!(dir.recommendations.is_empty());
    }

    #[test]
    fn test_file_defaults_from_partial_json() {
        let text = "```json\n{\"summary\":\"parses things\",\"complexity\":\"high\"}\n```";
        let result = parse_file_response(text, "/src/parse.rs");
        assert_eq!(result.summary, "parses things");
        // wrong-shape complexity falls back to the midpoint
        assert_eq!(result.complexity, 0.5);
        assert!(result.functions.is_empty());
        assert!(result.dependencies.is_empty());
    }

    #[test]
    fn test_file_missing_summary_names_the_path() {
        let text = "{\"complexity\":0.9}";
        let result = parse_file_response(text, "/src/lib.rs");
        assert_eq!(result.summary, "Analysis of /src/lib.rs");
        assert_eq!(result.complexity, 0.9);
    }

    #[test]
    fn test_directory_from_json() {
        let text = "```json\n{\"summary\":\"API routes\",\"structure\":{\"description\":\"flat\",\"key_components\":[\"login\"]},\"recommendations\":[\"add tests\"]}\n```";
        let result = parse_directory_response(text, "/api");
        assert_eq!(result.summary, "API routes");
        assert_eq!(
            result.structure.get("description").and_then(Value::as_str),
            Some("flat")
        );
        assert_eq!(result.recommendations, vec!["add tests".to_string()]);
    }

    #[test]
    fn test_directory_two_sections() {
        let text = "\n1. Holds the request handlers.\n2. Routing and validation live here.";
        let result = parse_directory_response(text, "/api");
        assert_eq!(result.summary, "Holds the request handlers.");
        assert_eq!(
            result.features.get("description").and_then(Value::as_str),
            Some("Routing and validation live here.")
        );
    }

    #[test]
    fn test_parse_feature_list_pairs_and_fallback() {
        let features = parse_feature_list("- auth: handles login\n- cache: stores results");
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "auth");
        assert_eq!(features[1].description, "stores results");

        let features = parse_feature_list("plain feature line\nanother one");
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, features[0].description);
    }

    #[test]
    fn test_wrong_shape_features_default_empty() {
        let text = "{\"summary\":\"s\",\"features\":\"not an array\"}";
        let result = parse_repository_response(text);
        assert_eq!(result.summary, "s");
        assert!(result.features.is_empty());
    }
}
