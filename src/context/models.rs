//! Request types for context budgeting

use crate::models::ModelRecord;
use serde::{Deserialize, Serialize};

/// Inputs for one prompt composition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetRequest {
    /// Requested model name; unknown names resolve to the default model
    pub model_hint: String,
    pub base_prompt: String,
    /// Rendered conversation history, empty when there is none
    #[serde(default)]
    pub prior_turn: String,
    /// Text extracted from attached files, empty when there is none
    #[serde(default)]
    pub file_text: String,
    /// Used instead of the registry when it is complete and valid
    #[serde(default)]
    pub model_override: Option<ModelRecord>,
}

impl BudgetRequest {
    pub fn new(model_hint: impl Into<String>, base_prompt: impl Into<String>) -> Self {
        Self {
            model_hint: model_hint.into(),
            base_prompt: base_prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_prior_turn(mut self, prior_turn: impl Into<String>) -> Self {
        self.prior_turn = prior_turn.into();
        self
    }

    pub fn with_file_text(mut self, file_text: impl Into<String>) -> Self {
        self.file_text = file_text.into();
        self
    }

    pub fn with_model_override(mut self, record: ModelRecord) -> Self {
        self.model_override = Some(record);
        self
    }
}

/// Inputs for budgeting a single document for summarization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub model_hint: String,
    pub base_prompt: String,
    pub document: String,
    #[serde(default)]
    pub model_override: Option<ModelRecord>,
}

impl DocumentRequest {
    pub fn new(
        model_hint: impl Into<String>,
        base_prompt: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        Self {
            model_hint: model_hint.into(),
            base_prompt: base_prompt.into(),
            document: document.into(),
            model_override: None,
        }
    }
}
