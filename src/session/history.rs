//! Conversation turns and the exchange protocol.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{GatewayError, Result, SessionError};
use crate::llm::{GatewayResponse, GenerationConfig, ModelGateway};

/// Text recorded when the gateway returns nothing usable.
pub const NO_TEXT_SENTINEL: &str = "[No response text found]";

/// Prefix of the text recorded when the prompt was blocked by a content policy.
pub const BLOCKED_PREFIX: &str = "[Blocked by Safety Setting: ";

/// Role of a turn author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message sent by the client.
    User,
    /// Response produced by the model.
    Model,
}

/// One immutable message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    /// Create a user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create a model turn.
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }

    /// Author of the turn.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Text content of the turn.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Ordered, append-only turn log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::user(text));
    }

    /// Append a model turn.
    ///
    /// Fails with [`SessionError::ProtocolViolation`] when there is no
    /// preceding turn; the transcript is left unchanged.
    pub fn push_model(&mut self, text: impl Into<String>) -> Result<()> {
        let Some(last) = self.turns.last() else {
            tracing::error!("Attempted to add a model response to an empty history");
            return Err(SessionError::ProtocolViolation);
        };
        if last.role == Role::Model {
            tracing::warn!("Adding model response immediately after another model response");
        }
        self.turns.push(Turn::model(text));
        Ok(())
    }

    /// Remove the trailing user turn, if the transcript ends with one.
    fn rollback_user(&mut self) -> Option<Turn> {
        if self.turns.last().is_some_and(|t| t.role == Role::User) {
            self.turns.pop()
        } else {
            None
        }
    }

    /// All turns in order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript has no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Per-call settings for one exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    /// Model identifier passed to the gateway.
    pub model: String,
    /// Generation configuration for this call only.
    pub generation: GenerationConfig,
    /// Upper bound on the gateway call.
    pub timeout: Duration,
}

/// Committed turn history of one session.
///
/// Readers only ever observe committed turns. An exchange works on a staged
/// copy and publishes it once the gateway outcome is known, so a pending user
/// turn is never visible and a failed exchange leaves nothing behind.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    committed: RwLock<Transcript>,
    /// Held for the whole of one exchange; at most one in flight per session.
    exchange_lock: Mutex<()>,
}

impl ConversationHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Transcript> {
        self.committed.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, transcript: Transcript) {
        let mut guard = self.committed.write().unwrap_or_else(PoisonError::into_inner);
        *guard = transcript;
    }

    /// Copy of the committed turns.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.read().turns().to_vec()
    }

    /// Number of committed turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no turns have been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Reset to an empty history. Waits for any in-flight exchange.
    pub async fn clear(&self) {
        let _exchange = self.exchange_lock.lock().await;
        self.commit(Transcript::new());
    }

    /// Append `user_text`, ask the gateway for a reply, and record it.
    ///
    /// On success the history grows by exactly one user turn and one model
    /// turn and the model text is returned. On any gateway failure or timeout
    /// the user turn is rolled back and [`SessionError::Exchange`] is
    /// returned; the committed history is identical to before the call.
    pub async fn exchange(
        &self,
        gateway: &dyn ModelGateway,
        options: &ExchangeOptions,
        user_text: &str,
    ) -> Result<String> {
        let _exchange = self.exchange_lock.lock().await;

        let mut staged = self.read().clone();
        staged.push_user(user_text);

        tracing::debug!(
            model = %options.model,
            turn_count = staged.len(),
            "Invoking model gateway"
        );

        match call_gateway(gateway, options, &staged).await {
            Ok(response) => {
                let text = extract_text(response);
                staged.push_model(text.clone())?;
                self.commit(staged);
                Ok(text)
            }
            Err(err) => {
                // The committed transcript was never touched; dropping the
                // staged copy is the rollback. Its tail must be our user turn.
                debug_assert!(
                    staged
                        .rollback_user()
                        .is_some_and(|turn| turn.text() == user_text)
                );
                tracing::warn!(
                    model = %options.model,
                    error = %err,
                    "Model call failed, user turn rolled back"
                );
                Err(err.into())
            }
        }
    }
}

async fn call_gateway(
    gateway: &dyn ModelGateway,
    options: &ExchangeOptions,
    staged: &Transcript,
) -> std::result::Result<GatewayResponse, GatewayError> {
    let call = gateway.generate(&options.model, staged.turns(), &options.generation);
    match tokio::time::timeout(options.timeout, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(GatewayError::Timeout(options.timeout)),
    }
}

/// Reduce a gateway response to the text recorded as the model turn.
///
/// Precedence: consolidated text, then the first part of the first
/// candidate, then a block-reason sentinel, then [`NO_TEXT_SENTINEL`].
#[must_use]
pub fn extract_text(response: GatewayResponse) -> String {
    match response {
        GatewayResponse::Text(text) => text,
        GatewayResponse::Candidates(candidates) => candidates
            .into_iter()
            .next()
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_else(|| {
                tracing::warn!("Received response with no usable text content");
                NO_TEXT_SENTINEL.to_string()
            }),
        GatewayResponse::Blocked { reason } => {
            tracing::warn!(block_reason = %reason, "Response blocked by safety settings");
            format!("{BLOCKED_PREFIX}{reason}]")
        }
    }
}
