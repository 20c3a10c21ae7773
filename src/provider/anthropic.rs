//! Anthropic messages-API provider.

use crate::error::ProviderError;
use crate::provider::{ProviderConfig, TranslationProvider, map_status, map_transport_error};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic translation provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl AnthropicProvider {
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
        format!("{base}/v1/messages")
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TranslationProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn translate(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.config.model,
            "max_tokens": MAX_TOKENS,
            "temperature": 0.3,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
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

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = body
            .content
            .iter()
            .filter(|p| p.part_type == "text")
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let content = content.trim();

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
        let provider = AnthropicProvider::new(ProviderConfig::new("k", "claude-sonnet-4-5"));
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_response_parsing_joins_text_parts() {
        let raw = r#"{"content":[{"type":"text","text":"Xin"},{"type":"text","text":"chào"},{"type":"tool_use"}]}"#;
        let parsed: Result<MessagesResponse, _> = serde_json::from_str(raw);
        assert!(parsed.is_ok());
        if let Ok(parsed) = parsed {
            let content = parsed
                .content
                .iter()
                .filter(|p| p.part_type == "text")
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            assert_eq!(content, "Xin\nchào");
        }
    }

    #[test]
    fn test_empty_content_list() {
        let raw = r"{}";
        let parsed: Result<MessagesResponse, _> = serde_json::from_str(raw);
        assert!(parsed.is_ok_and(|p| p.content.is_empty()));
    }
}
