//! Session handles and the process-wide session registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::llm::ModelGateway;

use super::history::{ConversationHistory, ExchangeOptions};

/// A single conversation session.
///
/// Cloning is cheap; all clones share the same history.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier.
    id: String,
    /// Conversation turns.
    history: ConversationHistory,
    /// Session creation time.
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                history: ConversationHistory::new(),
                created_at: Utc::now(),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The session's conversation history.
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.inner.history
    }

    /// When the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
}

/// Thread-safe store for sessions.
///
/// One instance is built at startup and shared with every handler. The map
/// lock guards insert, lookup and removal only; it is never held while a
/// model call is pending. Sessions live until deleted.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty session and return it.
    #[must_use]
    pub fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id().to_string(), session.clone());
        tracing::info!(session_id = %session.id(), "Created conversation");
        session
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        if session.is_some() {
            tracing::debug!(session_id = %id, "Retrieved conversation");
        } else {
            tracing::warn!(session_id = %id, "Attempted to retrieve non-existent conversation");
        }
        session
    }

    /// Remove a session by ID. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            tracing::info!(session_id = %id, "Deleted conversation");
        } else {
            tracing::warn!(session_id = %id, "Attempted to delete non-existent conversation");
        }
        removed
    }

    /// Get the number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List all session IDs.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Run one exchange against the session `id`.
    ///
    /// Unknown ids fail with [`SessionError::NotFound`] and no session is
    /// created.
    pub async fn send_message(
        &self,
        id: &str,
        gateway: &dyn ModelGateway,
        options: &ExchangeOptions,
        message: &str,
    ) -> Result<String> {
        tracing::info!(
            session_id = %id,
            model = %options.model,
            "Sending message to conversation"
        );

        let session = self
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        match session.history().exchange(gateway, options, message).await {
            Ok(text) => {
                tracing::info!(
                    session_id = %id,
                    turn_count = session.history().len(),
                    "Received model response"
                );
                Ok(text)
            }
            Err(err) => {
                tracing::error!(session_id = %id, error = %err, "Message exchange failed");
                Err(err)
            }
        }
    }
}
