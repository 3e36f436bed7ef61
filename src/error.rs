//! Error taxonomy for the session store and the model gateway.
//!
//! The core never decides HTTP status codes; it only reports which bucket a
//! failure belongs to. Mapping to responses lives in [`crate::server`].

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by session registry and history operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session id is not present in the registry.
    #[error("Conversation with ID '{0}' not found.")]
    NotFound(String),

    /// Caller input was malformed (missing message, bad generation config).
    #[error("{0}")]
    InvalidRequest(String),

    /// The model gateway call failed; history was rolled back.
    #[error("model exchange failed: {0}")]
    Exchange(#[from] GatewayError),

    /// A model turn was appended with no preceding turn.
    #[error("cannot add a model response before any user message")]
    ProtocolViolation,
}

/// Errors raised by a [`crate::llm::ModelGateway`] implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network or TLS failure talking to the provider.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// Response body could not be interpreted.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The call did not complete within the exchange timeout.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// Any other provider-side rejection.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
