//! Conversation state
//!
//! Per-session, TTL-bounded message log with typed turn kinds and the
//! two history views used to build prompts.

pub mod history;
pub mod models;
pub mod store;

pub use history::{full_history_text, latest_turn_text};
pub use models::{ConversationTurn, Role, TurnKind};
pub use store::{ConversationConfig, ConversationStore, MemoryConversationStore, StoreError};
