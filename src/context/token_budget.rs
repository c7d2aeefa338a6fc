//! Budget policy and decision types
//!
//! A decision is what the budgeter hands to a generation driver: the
//! assembled prompt, the model to call and the output-token ceiling.

use crate::models::{ModelConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::token_accountant::TokenError;

/// How attached file text is cut down to the available budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationStrategy {
    /// Keep a token-count proportion of the file in one tokenization pass.
    /// Can overshoot or undershoot by the token-density variance of the text.
    #[default]
    Ratio,
    /// Keep exactly as many tokens as the budget allows
    Exact,
}

/// Budgeting constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetPolicy {
    /// Divisor applied to the space left after the base prompt before file
    /// content is admitted
    #[serde(default = "default_safety_divisor")]
    pub safety_divisor: f64,

    /// Per-provider divisor applied to the requested output tokens
    #[serde(default = "default_output_divisors")]
    pub output_divisors: HashMap<ProviderKind, f64>,

    #[serde(default)]
    pub truncation: TruncationStrategy,

    /// Tokens held back when budgeting a document for summarization
    #[serde(default = "default_document_reserve")]
    pub document_reserve_tokens: usize,

    /// Output ceiling requested for document summaries
    #[serde(default = "default_document_output")]
    pub document_output_tokens: usize,
}

fn default_safety_divisor() -> f64 {
    1.40
}

fn default_output_divisors() -> HashMap<ProviderKind, f64> {
    HashMap::from([(ProviderKind::Anthropic, 1.30)])
}

fn default_document_reserve() -> usize {
    2000
}

fn default_document_output() -> usize {
    1000
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            safety_divisor: default_safety_divisor(),
            output_divisors: default_output_divisors(),
            truncation: TruncationStrategy::default(),
            document_reserve_tokens: default_document_reserve(),
            document_output_tokens: default_document_output(),
        }
    }
}

impl BudgetPolicy {
    /// Validate that the policy can produce meaningful budgets
    pub fn validate(&self) -> Result<(), BudgetError> {
        if !(self.safety_divisor.is_finite() && self.safety_divisor >= 1.0) {
            return Err(BudgetError::InvalidPolicy(format!(
                "safety_divisor must be >= 1.0, got {}",
                self.safety_divisor
            )));
        }
        if let Some((kind, divisor)) = self
            .output_divisors
            .iter()
            .find(|(_, d)| !(d.is_finite() && **d > 0.0))
        {
            return Err(BudgetError::InvalidPolicy(format!(
                "output divisor for {} must be positive, got {}",
                kind, divisor
            )));
        }
        Ok(())
    }

    /// Scale an output-token request down for providers whose practical
    /// ceiling is below the advertised one
    pub fn adjust_output(&self, provider: ProviderKind, requested: i64) -> i64 {
        match self.output_divisors.get(&provider) {
            Some(divisor) => (requested as f64 / divisor).trunc() as i64,
            None => requested,
        }
    }
}

/// What happened to the attached file text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// No file text was supplied
    Absent,
    /// Included in full
    Included,
    /// Included after truncation
    Truncated,
    /// Supplied but nothing survived truncation
    Dropped,
}

/// Which optional components made it into the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptComposition {
    /// `None` when the base prompt could not be measured
    pub base_tokens: Option<usize>,
    pub file: FileStatus,
    pub prior_turn_included: bool,
}

/// Budget decision for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDecision {
    pub final_prompt: String,
    /// May be zero or negative when the prompt exceeds the window
    pub requested_output_tokens: i64,
    /// Output ceiling before the provider adjustment
    pub unadjusted_output_tokens: i64,
    pub prompt_tokens: usize,
    pub remaining_tokens: i64,
    pub resolved_model: ModelConfig,
    pub composition: PromptComposition,
}

impl BudgetDecision {
    /// The prompt leaves no room for output. Callers should reject the
    /// request or cut the content down upstream.
    pub fn is_anomalous(&self) -> bool {
        self.requested_output_tokens <= 0
    }

    pub fn resolved_model_name(&self) -> &str {
        &self.resolved_model.name
    }

    pub fn resolved_provider_kind(&self) -> ProviderKind {
        self.resolved_model.provider_kind
    }

    pub fn resolved_location(&self) -> &str {
        &self.resolved_model.deployment_location
    }
}

/// Budgeter result, distinguishing a planned composition from a fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum BudgetOutcome {
    Composed(BudgetDecision),
    /// Measurement failed mid-composition; the prompt is the simplest safe
    /// composition
    Degraded { decision: BudgetDecision, reason: String },
}

impl BudgetOutcome {
    pub fn decision(&self) -> &BudgetDecision {
        match self {
            BudgetOutcome::Composed(decision) => decision,
            BudgetOutcome::Degraded { decision, .. } => decision,
        }
    }

    pub fn into_decision(self) -> BudgetDecision {
        match self {
            BudgetOutcome::Composed(decision) => decision,
            BudgetOutcome::Degraded { decision, .. } => decision,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BudgetOutcome::Degraded { .. })
    }

    pub fn degradation_reason(&self) -> Option<&str> {
        match self {
            BudgetOutcome::Composed(_) => None,
            BudgetOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BudgetOutcome::Composed(_) => "composed",
            BudgetOutcome::Degraded { .. } => "degraded",
        }
    }
}

/// Budgeting errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Token measurement failed: {0}")]
    Measurement(#[from] TokenError),

    #[error("Invalid budget policy: {0}")]
    InvalidPolicy(String),
}
