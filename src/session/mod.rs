//! Session and conversation history management.
//!
//! This module provides in-memory session storage for managing conversation
//! state across multiple requests. Sessions are identified by UUID and own
//! the full ordered turn history.
//!
//! # Architecture
//!
//! - [`Turn`]: One immutable role-tagged message
//! - [`ConversationHistory`]: Committed turns plus the exchange protocol
//! - [`Session`]: Handle pairing an id with its history
//! - [`SessionRegistry`]: Thread-safe store for all active sessions
//!
//! # Example
//!
//! ```rust
//! use chat_sessions::session::SessionRegistry;
//!
//! let registry = SessionRegistry::new();
//! let session = registry.create();
//!
//! assert!(registry.get(session.id()).is_some());
//! assert_eq!(session.history().len(), 0);
//! assert!(registry.delete(session.id()));
//! ```

mod history;
mod registry;

pub use history::{
    BLOCKED_PREFIX, ConversationHistory, ExchangeOptions, NO_TEXT_SENTINEL, Role, Transcript, Turn,
    extract_text,
};
pub use registry::{Session, SessionRegistry};
