//! OpenAI chat-completions provider.
//!
//! Works against any OpenAI-compatible endpoint via the base-URL override.
//! Raw JSON bodies are used so HTTP status classes stay visible to the
//! retry logic.

use crate::error::ProviderError;
use crate::provider::{ProviderConfig, TranslationProvider, map_status, map_transport_error};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible translation provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl OpenAiProvider {
    /// Creates a provider from connection settings.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn translate(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.3,
            "top_p": 0.9,
            "frequency_penalty": 0.1,
            "presence_penalty": 0.1,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_default();
            return Err(map_status(status.as_u16(), detail));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_default() {
        let provider = OpenAiProvider::new(ProviderConfig::new("k", "gpt-4o"));
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_endpoint_override() {
        let mut config = ProviderConfig::new("k", "local-model");
        config.base_url = Some("http://localhost:8080/v1/".to_string());
        let provider = OpenAiProvider::new(config);
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"content":"  Xin chào  "}}]}"#;
        let parsed: Result<ChatResponse, _> = serde_json::from_str(raw);
        assert!(parsed.is_ok());
        if let Ok(parsed) = parsed {
            let content = parsed
                .choices
                .first()
                .and_then(|c| c.message.content.as_deref())
                .map(str::trim);
            assert_eq!(content, Some("Xin chào"));
        }
    }

    #[test]
    fn test_error_body_parsing() {
        let raw = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        let parsed: Result<ErrorBody, _> = serde_json::from_str(raw);
        assert!(parsed.is_ok());
        if let Ok(parsed) = parsed {
            assert_eq!(
                parsed.error.and_then(|e| e.message).as_deref(),
                Some("Rate limit reached")
            );
        }
    }
}
