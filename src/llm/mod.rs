//! Model gateway trait and implementations.
//!
//! The session core depends only on the [`ModelGateway`] capability: given a
//! model name, the ordered turn history and a [`GenerationConfig`], produce a
//! [`GatewayResponse`] or fail.
//!
//! # Drivers
//!
//! - [`GeminiDriver`]: Gemini `generateContent` REST API, addressed either
//!   through Google AI Studio or Vertex AI (see [`Provider`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_sessions::llm::{GatewaySettings, GeminiDriver, Provider};
//!
//! let settings = GatewaySettings {
//!     base_url: "https://generativelanguage.googleapis.com".to_string(),
//!     api_key: Some("...".to_string()),
//!     provider: Provider::GoogleAi,
//! };
//! let driver = GeminiDriver::new(settings);
//! ```

pub mod gemini;
pub mod generation;
pub mod provider;

pub use gemini::GeminiDriver;
pub use generation::{GenerationConfig, SafetySetting, ThinkingConfig, ToolSpec};
pub use provider::Provider;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::session::Turn;

/// Connection settings for a gateway driver.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Base URL of the API, without trailing path.
    pub base_url: String,
    /// API key (Google AI) or bearer token (Vertex AI).
    pub api_key: Option<String>,
    /// Endpoint flavour.
    pub provider: Provider,
}

impl GatewaySettings {
    /// Resolve driver settings from the loaded gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, String> {
        let provider = match config.provider.to_lowercase().as_str() {
            "google_ai" | "googleai" | "gemini" => Provider::GoogleAi,
            "vertex_ai" | "vertexai" | "vertex" => {
                let project = config
                    .project
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| "Vertex AI requires gateway.project (GOOGLE_PROJECT_NAME)".to_string())?;
                let location = config
                    .region
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| "Vertex AI requires gateway.region (GOOGLE_REGION)".to_string())?;
                Provider::VertexAi { project, location }
            }
            other => return Err(format!("Unknown gateway provider: {other}")),
        };

        let base_url = config
            .base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| provider.default_base_url());

        let api_key = config.api_key.clone().filter(|s| !s.trim().is_empty());

        Ok(Self {
            base_url,
            api_key,
            provider,
        })
    }

    /// Startup warning about credentials, if any applies.
    ///
    /// Vertex AI takes a static bearer token with no refresh; it expires
    /// after about an hour and the process must be restarted with a new one.
    #[must_use]
    pub fn credential_warning(&self) -> Option<&'static str> {
        match (&self.provider, &self.api_key) {
            (Provider::VertexAi { .. }, None) => {
                Some("Vertex AI selected without a bearer token; calls will be rejected")
            }
            (Provider::VertexAi { .. }, Some(_)) => {
                Some("Vertex AI bearer token is static and is not refreshed when it expires")
            }
            (Provider::GoogleAi, None) => Some("Google AI selected without an API key"),
            (Provider::GoogleAi, Some(_)) => None,
        }
    }
}

/// One content part of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Part {
    /// Text of the part, if it carries any.
    pub text: Option<String>,
}

impl Part {
    /// A text part.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            text: Some(s.into()),
        }
    }
}

/// One generated candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Candidate {
    /// Content parts in order.
    pub parts: Vec<Part>,
}

/// Shapes a gateway response can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    /// A single consolidated text.
    Text(String),
    /// Raw candidates, each with content parts.
    Candidates(Vec<Candidate>),
    /// The prompt was suppressed by a content policy.
    Blocked {
        /// Provider-reported block reason.
        reason: String,
    },
}

/// Capability that turns a conversation into a model response.
#[async_trait::async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate a response for the full ordered `turns`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success provider status
    /// or an undecodable response.
    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<GatewayResponse, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_config(provider: &str) -> GatewayConfig {
        GatewayConfig {
            provider: provider.to_string(),
            base_url: None,
            api_key: Some("key".to_string()),
            project: None,
            region: None,
            default_model: None,
            timeout_secs: 120,
            system_instruction: None,
        }
    }

    #[test]
    fn test_settings_google_ai_defaults() {
        let settings = GatewaySettings::from_config(&gateway_config("google_ai")).unwrap();
        assert_eq!(settings.provider, Provider::GoogleAi);
        assert_eq!(settings.base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(settings.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_settings_vertex_requires_project_and_region() {
        let mut config = gateway_config("vertex_ai");
        assert!(GatewaySettings::from_config(&config).is_err());

        config.project = Some("my-project".to_string());
        config.region = Some("us-central1".to_string());
        let settings = GatewaySettings::from_config(&config).unwrap();
        assert_eq!(settings.base_url, "https://us-central1-aiplatform.googleapis.com");
        assert!(matches!(settings.provider, Provider::VertexAi { .. }));
    }

    #[test]
    fn test_credential_warnings() {
        let google = GatewaySettings::from_config(&gateway_config("google_ai")).unwrap();
        assert!(google.credential_warning().is_none());

        let mut config = gateway_config("vertex_ai");
        config.project = Some("p".to_string());
        config.region = Some("us-central1".to_string());
        let vertex = GatewaySettings::from_config(&config).unwrap();
        assert!(vertex.credential_warning().unwrap().contains("not refreshed"));

        config.api_key = Some("  ".to_string());
        let tokenless = GatewaySettings::from_config(&config).unwrap();
        assert!(tokenless.credential_warning().unwrap().contains("without a bearer token"));
    }

    #[test]
    fn test_settings_unknown_provider() {
        assert!(GatewaySettings::from_config(&gateway_config("openai")).is_err());
    }
}
