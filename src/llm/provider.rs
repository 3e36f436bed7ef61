//! Provider-specific endpoint construction.
//!
//! Gemini models are reachable through two front doors that differ in URL
//! layout and authentication.

/// Supported Gemini endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Google AI Studio (generativelanguage.googleapis.com), API key auth.
    GoogleAi,
    /// Vertex AI, bearer token auth.
    VertexAi {
        /// Google Cloud project ID
        project: String,
        /// Region, e.g. "us-central1"
        location: String,
    },
}

impl Provider {
    /// Default base URL when none is configured.
    #[must_use]
    pub fn default_base_url(&self) -> String {
        match self {
            Self::GoogleAi => "https://generativelanguage.googleapis.com".to_string(),
            Self::VertexAi { location, .. } => {
                format!("https://{location}-aiplatform.googleapis.com")
            }
        }
    }

    /// Build the `generateContent` URL for `model`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL (trailing slash tolerated)
    /// * `model` - The model name, e.g. `gemini-2.5-flash`
    #[must_use]
    pub fn build_generate_url(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::GoogleAi => format!("{base}/v1beta/models/{model}:generateContent"),
            Self::VertexAi { project, location } => format!(
                "{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
            ),
        }
    }

    /// Apply this provider's authentication scheme to a request.
    #[must_use]
    pub fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        api_key: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match (self, api_key) {
            (Self::GoogleAi, Some(key)) => request.header("x-goog-api-key", key),
            (Self::VertexAi { .. }, Some(token)) => request.bearer_auth(token),
            (_, None) => request,
        }
    }
}
