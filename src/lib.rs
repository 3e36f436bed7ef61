//! In-memory conversational session store with a generative model gateway.
//!
//! Clients create conversations, send user messages into them and read back
//! the ordered history. Each message is one exchange: the whole conversation
//! is sent to the model and the reply is recorded alongside the user turn.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP surface over the session registry
//! - **Sessions**: registry of conversations, each with an append-only transcript
//! - **Gateway**: model capability trait plus a Gemini REST driver
//!
//! # Modules
//!
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`error`]: session and gateway error taxonomy
//! - [`llm`]: gateway trait, generation settings and drivers
//! - [`server`]: HTTP routes and error mapping
//! - [`session`]: conversation registry and history
//! - [`telemetry`]: tracing subscriber setup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod session;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use llm::{GenerationConfig, ModelGateway};
use session::SessionRegistry;

/// Per-call settings applied when a request does not override them.
#[derive(Debug, Clone)]
pub struct ExchangeDefaults {
    /// Model used when the request names none.
    pub default_model: Option<String>,
    /// Generation settings used when the request carries no override.
    pub generation: GenerationConfig,
    /// Bound on a single model call.
    pub timeout: Duration,
}

impl ExchangeDefaults {
    /// Derive defaults from the gateway configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            default_model: config
                .default_model
                .clone()
                .filter(|m| !m.trim().is_empty()),
            generation: GenerationConfig::standard(config.system_instruction.as_deref()),
            timeout: config.timeout(),
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Conversation registry.
    pub sessions: SessionRegistry,
    /// Model gateway used for every exchange.
    pub gateway: Arc<dyn ModelGateway>,
    /// Server-wide exchange defaults.
    pub defaults: Arc<ExchangeDefaults>,
}

impl AppState {
    /// Create state with a fresh, empty registry.
    #[must_use]
    pub fn new(gateway: Arc<dyn ModelGateway>, defaults: ExchangeDefaults) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            gateway,
            defaults: Arc::new(defaults),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
