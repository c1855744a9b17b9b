//! Text generation client
//!
//! Sends analysis prompts to the Gemini `generateContent` endpoint. The
//! public [`GeminiClient::generate`] never fails: when no API key is
//! configured, or when the call fails in any way, it substitutes a fixed
//! offline narrative keyed off the prompt's granularity. The pipeline
//! prefers a low-confidence canned answer over a hard failure.

use crate::error::{AnalysisError, Result};
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const GENERATE_PATH: &str = "/v1beta/models/gemini-pro:generateContent";
const REQUEST_TIMEOUT_SECS: u64 = 60;

// Fixed sampling parameters for analysis generation
const TEMPERATURE: f32 = 0.2;
const TOP_K: u32 = 40;
const TOP_P: f32 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Client for the Gemini text generation service
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new client; without a key every call takes the fallback path
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Overrides the API base URL, for tests against a local mock server
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Generates analysis text for a prompt
    ///
    /// Never fails: any transport or envelope problem is logged and replaced
    /// with the deterministic fallback narrative for the prompt's
    /// granularity.
    pub async fn generate(&self, prompt: &str) -> String {
        match self.try_generate(prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!("Generation service unavailable, using fallback: {}", err);
                fallback_response(prompt).to_string()
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AnalysisError::Generation("no API key configured".into()))?;

        let url = format!("{}{}?key={}", self.base_url, GENERATE_PATH, api_key);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_k: TOP_K,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Generation(format!(
                "generation request failed with status {}",
                status
            )));
        }

        let envelope: GenerateResponse = response.json().await?;
        extract_text(envelope)
    }
}

/// Pulls the first candidate's first text part out of the response envelope
fn extract_text(envelope: GenerateResponse) -> Result<String> {
    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| AnalysisError::Generation("unexpected response format".into()))
}

/// Selects the canned offline narrative for a prompt
///
/// Dispatch keys off the distinctive phrase each prompt template opens with,
/// so every granularity maps to its own narrative even though prompts embed
/// arbitrary repository text.
pub fn fallback_response(prompt: &str) -> &'static str {
    if prompt.contains("code file") {
        FILE_FALLBACK
    } else if prompt.contains("directory structure") {
        DIRECTORY_FALLBACK
    } else {
        REPOSITORY_FALLBACK
    }
}

const FILE_FALLBACK: &str = "\
Summary: The file could not be analyzed by the generation service; this is a \
generic placeholder assessment.

The file appears to be a standard source file within the project. Its exact \
responsibilities, exported functions and dependencies could not be determined \
offline. Re-run the analysis once the generation service is configured and \
reachable to obtain a detailed breakdown of functions, complexity and \
potential issues.";

const DIRECTORY_FALLBACK: &str = "\
Summary: The directory could not be analyzed by the generation service; this \
is a generic placeholder assessment.

The directory groups related source files within the project. Its internal \
organization, key components and relationships to other parts of the codebase \
could not be determined offline. Re-run the analysis once the generation \
service is configured and reachable to obtain structure details and \
recommendations.";

const REPOSITORY_FALLBACK: &str = "\
Summary: The repository could not be analyzed by the generation service; this \
is a generic placeholder assessment.

The project layout, language distribution and recognized manifests were \
collected successfully, but the architectural narrative, feature inventory \
and quality assessment require the generation service. Re-run the analysis \
once the service is configured and reachable to obtain the complete report.";
