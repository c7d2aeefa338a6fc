//! Streaming SRS document generation

use super::documents::{combine_documents, UploadedDocument};
use super::{default_model, ensure_room_for_output};
use crate::context::{BudgetOutcome, BudgetRequest, ContextBudgeter};
use crate::conversation::{ConversationStore, TurnKind};
use crate::error::{Error, Result};
use crate::generation::{strip_fences, ChatModel, ChunkStream, GenerationRequest};
use crate::models::ModelRecord;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Request for one SRS draft or revision
#[derive(Debug, Clone, Deserialize)]
pub struct SrsRequest {
    /// Conversation the draft belongs to; earlier drafts are fed back in
    pub session_id: String,
    pub user_query: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub documents: Vec<UploadedDocument>,
    #[serde(default)]
    pub model_override: Option<ModelRecord>,
}

impl SrsRequest {
    pub fn new(session_id: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_query: user_query.into(),
            model: default_model(),
            temperature: None,
            documents: Vec::new(),
            model_override: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(Error::Validation("session_id cannot be empty".to_string()));
        }
        if self.user_query.trim().is_empty() {
            return Err(Error::Validation("user_query cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Budget decision plus the cleaned-up document stream
pub struct SrsStream {
    pub outcome: BudgetOutcome,
    pub chunks: ChunkStream,
}

pub fn srs_prompt(user_query: &str) -> String {
    format!(
        "Analyse the user query and chat history and generate an SRS document.\n\
         <USER_QUERY> {user_query} </USER_QUERY>"
    )
}

/// Writes and revises SRS documents for a session
pub struct SrsWriter {
    model: Arc<dyn ChatModel>,
    budgeter: Arc<ContextBudgeter>,
    store: Arc<dyn ConversationStore>,
    default_temperature: f32,
}

impl SrsWriter {
    pub fn new(
        model: Arc<dyn ChatModel>,
        budgeter: Arc<ContextBudgeter>,
        store: Arc<dyn ConversationStore>,
        default_temperature: f32,
    ) -> Self {
        Self {
            model,
            budgeter,
            store,
            default_temperature,
        }
    }

    /// Compose the prompt without calling the model
    pub async fn budget(&self, request: &SrsRequest) -> Result<BudgetOutcome> {
        request.validate()?;

        let prior_turn = self
            .store
            .latest_turn_text(&request.session_id, TurnKind::Proposal)
            .await;

        let mut budget = BudgetRequest::new(&request.model, srs_prompt(&request.user_query))
            .with_prior_turn(prior_turn)
            .with_file_text(combine_documents(&request.documents));
        if let Some(record) = &request.model_override {
            budget = budget.with_model_override(record.clone());
        }

        Ok(self.budgeter.build(&budget)?)
    }

    /// Start streaming a document. The finished document and the query are
    /// logged as a proposal exchange once the stream ends without error.
    pub async fn stream(&self, request: SrsRequest) -> Result<SrsStream> {
        let outcome = self.budget(&request).await?;
        let decision = outcome.decision();
        ensure_room_for_output(decision)?;

        info!(
            session_id = %request.session_id,
            model = decision.resolved_model_name(),
            prompt_tokens = decision.prompt_tokens,
            max_tokens = decision.requested_output_tokens,
            "Generating SRS document"
        );

        let temperature = request.temperature.unwrap_or(self.default_temperature);
        let generation = GenerationRequest::from_decision(decision, temperature);
        let chunks = strip_fences(self.model.stream(&generation).await?);
        let chunks = record_on_completion(chunks, self.store.clone(), request);

        Ok(SrsStream { outcome, chunks })
    }
}

fn record_on_completion(
    mut inner: ChunkStream,
    store: Arc<dyn ConversationStore>,
    request: SrsRequest,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut document = String::new();
        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    document.push_str(&chunk);
                    yield Ok(chunk);
                }
                Err(e) => {
                    warn!(session_id = %request.session_id, error = %e, "SRS stream failed");
                    yield Err(e);
                    return;
                }
            }
        }

        if let Err(e) = store
            .record_exchange(&request.session_id, TurnKind::Proposal, &request.user_query, &document)
            .await
        {
            warn!(session_id = %request.session_id, error = %e, "Failed to record SRS exchange");
        }
    })
}
