use super::ProviderFailure;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Role, text: &str) -> Self {
        Self {
            role,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
pub fn extract_text(body: &str) -> Result<String, ProviderFailure> {
    let data: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderFailure::Failed(format!("invalid response envelope: {}", e)))?;
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| ProviderFailure::Failed("response contained no candidate text".to_string()))
}

/// One upstream call made with one credential.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, ProviderFailure>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
}

impl GeminiClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Gemini HTTP client")?;
        info!(
            "Gemini client initialized (url: {}, timeout: {}s)",
            url,
            timeout.as_secs()
        );
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, ProviderFailure> {
        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderFailure::Failed(e.to_string()))?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(ProviderFailure::Status(resp.status().as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderFailure::Failed(e.to_string()))?;
        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_matches_generate_content_shape() {
        let request = GenerateRequest {
            contents: vec![
                Content::text(Role::User, "hi"),
                Content::text(Role::Model, "hello"),
            ],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                ]
            })
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "**bold**"}, {"text": "more"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ],
            "usageMetadata": {"totalTokenCount": 12}
        }"#;
        assert_eq!(extract_text(body).unwrap(), "**bold**");
    }

    #[test]
    fn empty_or_malformed_envelopes_are_failures() {
        assert!(matches!(
            extract_text(r#"{"candidates": []}"#),
            Err(ProviderFailure::Failed(_))
        ));
        assert!(matches!(
            extract_text(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#),
            Err(ProviderFailure::Failed(_))
        ));
        assert!(matches!(
            extract_text("<html>bad gateway</html>"),
            Err(ProviderFailure::Failed(_))
        ));
    }
}
