//! Pluggable translation provider interface.
//!
//! Implementations handle the transport layer for a specific LLM vendor
//! while presenting a uniform `translate(system, user) -> text` surface.
//! All agent logic stays decoupled from any particular vendor; the
//! dispatcher only sees [`ProviderError`] classes.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for translation provider backends.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Provider name (e.g. `"openai"`, `"anthropic"`).
    fn name(&self) -> &'static str;

    /// Translates `user` text under the given system instructions.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] classified for retry decisions.
    async fn translate(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Connection settings shared by the shipped providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Optional base-URL override (proxies, compatible servers).
    pub base_url: Option<String>,
    /// Client-level safety timeout in seconds. The dispatcher owns the
    /// per-task timeout; this one only guards a wedged connection.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Creates a config with the default safety timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout_secs: 300,
        }
    }
}

/// Instantiates a provider by name.
///
/// # Errors
///
/// Returns [`ProviderError::UnsupportedProvider`] for unknown names.
pub fn create_provider(
    name: &str,
    config: ProviderConfig,
) -> Result<Arc<dyn TranslationProvider>, ProviderError> {
    match name.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config))),
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(config))),
        other => Err(ProviderError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Maps a `reqwest` transport error to a provider error.
pub(crate) fn map_transport_error(err: &reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            seconds: timeout_secs,
        }
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// Maps a non-success HTTP status plus body detail to a provider error.
pub(crate) fn map_status(status: u16, detail: String) -> ProviderError {
    if status == 429 {
        ProviderError::RateLimited
    } else {
        ProviderError::Http {
            status,
            message: detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_known() {
        let config = ProviderConfig::new("key", "model");
        assert!(create_provider("openai", config.clone()).is_ok());
        assert!(create_provider("Anthropic", config).is_ok());
    }

    #[test]
    fn test_create_provider_unknown() {
        let config = ProviderConfig::new("key", "model");
        let err = create_provider("cohere", config).err();
        assert!(matches!(err, Some(ProviderError::UnsupportedProvider { .. })));
    }

    #[test]
    fn test_map_status_classes() {
        assert!(matches!(map_status(429, String::new()), ProviderError::RateLimited));
        assert!(matches!(
            map_status(503, String::new()),
            ProviderError::Http { status: 503, .. }
        ));
        let permanent = map_status(401, "bad key".to_string());
        assert!(!permanent.is_retryable());
        let transient = map_status(500, String::new());
        assert!(transient.is_retryable());
    }
}
