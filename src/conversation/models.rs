//! Conversation data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// Conversational class of a turn. Kinds are never mixed when rendering
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    /// Task-planning dialog, rendered with full history
    Plan,
    /// Iterative document refinement, rendered with only the latest answer
    Proposal,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Plan => "plan",
            TurnKind::Proposal => "proposal",
        }
    }
}

impl fmt::Display for TurnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub kind: TurnKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, kind: TurnKind, content: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(kind: TurnKind, content: impl Into<String>) -> Self {
        Self::new(Role::User, kind, content)
    }

    pub fn agent(kind: TurnKind, content: impl Into<String>) -> Self {
        Self::new(Role::Agent, kind, content)
    }
}
