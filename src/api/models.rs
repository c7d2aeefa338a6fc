//! Request and response bodies for the HTTP API

use crate::context::{BudgetOutcome, PromptComposition};
use crate::conversation::{ConversationTurn, TurnKind};
use crate::models::{ModelConfig, ProviderKind};
use serde::{Deserialize, Serialize};

/// Error codes
pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONTENT_TOO_LARGE: &str = "CONTENT_TOO_LARGE";
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub models: Vec<ModelConfig>,
}

/// Budgeter output for a preview request
#[derive(Debug, Serialize, Deserialize)]
pub struct BudgetPreviewResponse {
    pub final_prompt: String,
    pub requested_output_tokens: i64,
    pub resolved_model_name: String,
    pub resolved_provider_kind: ProviderKind,
    pub resolved_location: String,
    pub prompt_tokens: usize,
    pub remaining_tokens: i64,
    pub composition: PromptComposition,
    pub anomalous: bool,
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<String>,
}

impl From<&BudgetOutcome> for BudgetPreviewResponse {
    fn from(outcome: &BudgetOutcome) -> Self {
        let decision = outcome.decision();
        Self {
            final_prompt: decision.final_prompt.clone(),
            requested_output_tokens: decision.requested_output_tokens,
            resolved_model_name: decision.resolved_model_name().to_string(),
            resolved_provider_kind: decision.resolved_provider_kind(),
            resolved_location: decision.resolved_location().to_string(),
            prompt_tokens: decision.prompt_tokens,
            remaining_tokens: decision.remaining_tokens,
            composition: decision.composition.clone(),
            anomalous: decision.is_anomalous(),
            degraded: outcome.is_degraded(),
            degradation_reason: outcome.degradation_reason().map(str::to_string),
        }
    }
}

/// Which rendering of a session's history to return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryView {
    #[default]
    Full,
    Latest,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub kind: TurnKind,
    #[serde(default)]
    pub view: HistoryView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub kind: TurnKind,
    pub view: HistoryView,
    pub text: String,
    pub turns: Vec<ConversationTurn>,
}

/// A user message and the agent's answer, logged together
#[derive(Debug, Deserialize)]
pub struct RecordTurnsRequest {
    pub kind: TurnKind,
    pub user: String,
    pub agent: String,
}
