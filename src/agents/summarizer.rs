//! Single-document summarization

use super::{default_model, ensure_room_for_output};
use crate::context::{BudgetOutcome, ContextBudgeter, DocumentRequest, FileStatus};
use crate::error::{Error, Result};
use crate::generation::{ChatModel, GenerationRequest};
use crate::models::{ModelRecord, ProviderKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const SUMMARY_PROMPT: &str = "Summarize the document below. Keep every requirement, constraint, \
     stakeholder and deadline it mentions, and drop boilerplate.";

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
    pub document: String,
    /// Replaces the default summarization instruction
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model_override: Option<ModelRecord>,
}

impl SummaryRequest {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            instructions: None,
            model: default_model(),
            temperature: None,
            model_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub summary: String,
    pub model: String,
    pub provider_kind: ProviderKind,
    /// Whether the document reached the model whole, cut or not at all
    pub document: FileStatus,
    pub degraded: bool,
}

pub struct DocumentSummarizer {
    model: Arc<dyn ChatModel>,
    budgeter: Arc<ContextBudgeter>,
    default_temperature: f32,
}

impl DocumentSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, budgeter: Arc<ContextBudgeter>, default_temperature: f32) -> Self {
        Self {
            model,
            budgeter,
            default_temperature,
        }
    }

    pub fn budget(&self, request: &SummaryRequest) -> Result<BudgetOutcome> {
        if request.document.trim().is_empty() {
            return Err(Error::Validation("document cannot be empty".to_string()));
        }

        let prompt = request
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(SUMMARY_PROMPT);

        let mut budget = DocumentRequest::new(&request.model, prompt, request.document.clone());
        budget.model_override = request.model_override.clone();
        Ok(self.budgeter.build_document(&budget)?)
    }

    pub async fn summarize(&self, request: SummaryRequest) -> Result<DocumentSummary> {
        let outcome = self.budget(&request)?;
        let decision = outcome.decision();
        ensure_room_for_output(decision)?;

        let temperature = request.temperature.unwrap_or(self.default_temperature);
        let generation = GenerationRequest::from_decision(decision, temperature);
        let summary = self.model.complete(&generation).await?;

        info!(
            model = decision.resolved_model_name(),
            document = ?decision.composition.file,
            summary_len = summary.len(),
            "Document summarized"
        );

        Ok(DocumentSummary {
            summary: summary.trim().to_string(),
            model: decision.resolved_model_name().to_string(),
            provider_kind: decision.resolved_provider_kind(),
            document: decision.composition.file,
            degraded: outcome.is_degraded(),
        })
    }
}
