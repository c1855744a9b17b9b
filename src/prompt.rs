//! Prompt construction
//!
//! Purely templating: each function renders an instruction string asking the
//! generation service for a fixed JSON shape. The requested shape is
//! advisory only, so the normalizer in [`crate::parse`] stays defensive.

use crate::context::AnalysisContext;
use crate::github::{ContentsEntry, RepoMetadata};

/// Builds the repository-granularity prompt from metadata and derived
/// context; metadata is optional so the template also renders without it
pub fn repository_prompt(metadata: Option<&RepoMetadata>, context: &AnalysisContext) -> String {
    let about = metadata.map(render_metadata).unwrap_or_default();
    let languages = serde_json::to_string(&context.languages).unwrap_or_default();
    let key_files = serde_json::to_string(&context.key_files).unwrap_or_default();
    let stats = serde_json::to_string(&context.stats).unwrap_or_default();
    let structure = serde_json::to_string_pretty(&context.structure).unwrap_or_default();

    format!(
        r#"Analyze the following GitHub repository structure and provide insights:
{about}
Repository Statistics:
- Languages: {languages}
- Key Files: {key_files}
- Stats: {stats}

Structure:
{structure}

Provide the following in JSON format:
{{
  "summary": "Overall summary of the repository",
  "features": [
    {{ "name": "Feature name", "description": "Feature description" }}
  ],
  "architecture": {{
    "pattern": "Architectural pattern used",
    "components": ["Key architectural components"],
    "description": "Description of the architecture"
  }},
  "codeStats": {{
    "complexity": "Overall complexity assessment",
    "quality": "Code quality assessment",
    "maintainability": "Maintainability assessment"
  }},
  "items": [
    {{ "path": "Path to a notable entry", "summary": "Summary of that entry" }}
  ]
}}"#
    )
}

fn render_metadata(metadata: &RepoMetadata) -> String {
    let mut lines = vec![format!("Repository: {}", metadata.full_name)];
    if let Some(description) = &metadata.description {
        lines.push(format!("Description: {}", description));
    }
    if let Some(language) = &metadata.language {
        lines.push(format!("Primary Language: {}", language));
    }
    lines.push(format!(
        "Stars: {} | Forks: {}",
        metadata.stargazers_count, metadata.forks_count
    ));
    format!("\n{}\n", lines.join("\n"))
}

/// Builds the directory-granularity prompt from a path and its immediate
/// listing
pub fn directory_prompt(path: &str, listing: &[ContentsEntry]) -> String {
    let contents = serde_json::to_string_pretty(listing).unwrap_or_default();

    format!(
        r#"Analyze the following directory structure and provide insights:

Directory: {path}
Contents:
{contents}

Provide the following in JSON format:
{{
  "summary": "Summary of this directory's purpose",
  "features": {{
    "key_feature_1": "Description of feature 1",
    "key_feature_2": "Description of feature 2"
  }},
  "structure": {{
    "description": "Description of the directory structure",
    "key_components": ["List of key components in this directory"]
  }},
  "dependencies": ["List of key dependencies or relationships"],
  "recommendations": ["Potential improvements or recommendations"]
}}"#
    )
}

/// Builds the file-granularity prompt from a path and the full file content
pub fn file_prompt(path: &str, content: &str) -> String {
    format!(
        r#"Analyze the following code file and provide insights:

File: {path}
Content:
{content}

Provide the following in JSON format:
{{
  "summary": "Summary of what this file does",
  "features": {{
    "key_feature_1": "Description of feature 1",
    "key_feature_2": "Description of feature 2"
  }},
  "complexity": 0.0 to 1.0 (estimated complexity score),
  "functions": [
    {{ "name": "functionName", "description": "What this function does" }}
  ],
  "dependencies": ["List of dependencies or imports used"],
  "issues": [
    {{ "type": "issue type", "description": "Description of potential issue" }}
  ]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;

    #[test]
    fn test_file_prompt_embeds_path_and_content() {
        let prompt = file_prompt("/src/lib.rs", "pub fn f() {}");
        assert!(prompt.starts_with("Analyze the following code file"));
        assert!(prompt.contains("File: /src/lib.rs"));
        assert!(prompt.contains("pub fn f() {}"));
    }

    #[test]
    fn test_directory_prompt_embeds_listing() {
        let listing = vec![ContentsEntry {
            name: "mod.rs".to_string(),
            path: "src/mod.rs".to_string(),
            size: 12,
            kind: "file".to_string(),
            download_url: None,
        }];
        let prompt = directory_prompt("/src", &listing);
        assert!(prompt.starts_with("Analyze the following directory structure"));
        assert!(prompt.contains("Directory: /src"));
        assert!(prompt.contains("mod.rs"));
    }

    #[test]
    fn test_repository_prompt_embeds_context() {
        let context = build_context(&[]);
        let prompt = repository_prompt(None, &context);
        assert!(prompt.starts_with("Analyze the following GitHub repository structure"));
        assert!(prompt.contains("\"codeStats\""));
    }

    #[test]
    fn test_repository_prompt_embeds_metadata() {
        let metadata = RepoMetadata {
            name: "widget".to_string(),
            full_name: "acme/widget".to_string(),
            description: Some("Widgets for everyone".to_string()),
            language: Some("Rust".to_string()),
            stargazers_count: 5,
            forks_count: 1,
            default_branch: Some("main".to_string()),
        };
        let prompt = repository_prompt(Some(&metadata), &build_context(&[]));
        assert!(prompt.contains("Repository: acme/widget"));
        assert!(prompt.contains("Description: Widgets for everyone"));
        assert!(prompt.contains("Primary Language: Rust"));
        assert!(prompt.contains("Stars: 5 | Forks: 1"));
    }
}
