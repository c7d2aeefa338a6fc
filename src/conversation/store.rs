//! Session-keyed conversation log with TTL

use super::history;
use super::models::{ConversationTurn, TurnKind};
use crate::metrics::METRICS;
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Conversation store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),

    #[error("Conversation store unavailable: {0}")]
    Unavailable(String),
}

/// Conversation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Prefix of every session key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Idle session lifetime, refreshed on every write
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of live sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
}

fn default_key_prefix() -> String { "sprint_speed".to_string() }
fn default_ttl_secs() -> u64 { 3600 }
fn default_max_sessions() -> u64 { 100_000 }

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            ttl_secs: default_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl ConversationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Append-only, per-session message log
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append turns to a session in order, as one write
    async fn extend(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<(), StoreError>;

    /// All turns of a session, oldest first
    async fn turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>, StoreError>;

    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;

    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), StoreError> {
        self.extend(session_id, vec![turn]).await
    }

    /// Log a user request and the agent's answer under one kind
    async fn record_exchange(
        &self,
        session_id: &str,
        kind: TurnKind,
        user: &str,
        agent: &str,
    ) -> Result<(), StoreError> {
        self.extend(
            session_id,
            vec![ConversationTurn::user(kind, user), ConversationTurn::agent(kind, agent)],
        )
        .await
    }

    /// Full history view. A failed read renders as empty text.
    async fn full_history_text(&self, session_id: &str, kind: TurnKind) -> String {
        match self.turns(session_id).await {
            Ok(turns) => history::full_history_text(&turns, kind),
            Err(e) => {
                warn!(session_id, kind = %kind, error = %e, "Failed to read conversation history");
                METRICS.conversation_read_failures.inc();
                String::new()
            }
        }
    }

    /// Latest-answer view. A failed read renders as empty text.
    async fn latest_turn_text(&self, session_id: &str, kind: TurnKind) -> String {
        match self.turns(session_id).await {
            Ok(turns) => history::latest_turn_text(&turns, kind),
            Err(e) => {
                warn!(session_id, kind = %kind, error = %e, "Failed to read conversation history");
                METRICS.conversation_read_failures.inc();
                String::new()
            }
        }
    }
}

/// In-process store on a moka cache
pub struct MemoryConversationStore {
    cache: Cache<String, Arc<Vec<ConversationTurn>>>,
    key_prefix: String,
}

impl MemoryConversationStore {
    pub fn new(config: &ConversationConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_sessions)
            .time_to_live(config.ttl())
            .build();

        Self {
            cache,
            key_prefix: config.key_prefix.clone(),
        }
    }

    fn key(&self, session_id: &str) -> Result<String, StoreError> {
        if session_id.trim().is_empty() {
            return Err(StoreError::InvalidSession(session_id.to_string()));
        }
        Ok(format!("{}:{}", self.key_prefix, session_id))
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn extend(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<(), StoreError> {
        let key = self.key(session_id)?;
        for turn in &turns {
            METRICS.conversation_appends.with_label_values(&[turn.kind.as_str()]).inc();
        }
        let added = turns.len();

        // Re-inserting restarts the entry's time-to-live
        let entry = self
            .cache
            .entry(key)
            .and_upsert_with(|existing| {
                let mut log = existing
                    .map(|e| e.into_value().as_ref().clone())
                    .unwrap_or_default();
                log.extend(turns);
                std::future::ready(Arc::new(log))
            })
            .await;

        debug!(session_id, added, total = entry.value().len(), "Conversation turns appended");
        Ok(())
    }

    async fn turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>, StoreError> {
        let key = self.key(session_id)?;
        Ok(self
            .cache
            .get(&key)
            .await
            .map(|log| log.as_ref().clone())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        let key = self.key(session_id)?;
        self.cache.invalidate(&key).await;
        Ok(())
    }
}
