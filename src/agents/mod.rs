//! Generation workflows
//!
//! Each agent budgets its prompt with the [`ContextBudgeter`], calls a
//! [`ChatModel`] and, where the workflow is conversational, logs the
//! exchange in the [`ConversationStore`].
//!
//! [`ContextBudgeter`]: crate::context::ContextBudgeter
//! [`ChatModel`]: crate::generation::ChatModel
//! [`ConversationStore`]: crate::conversation::ConversationStore

pub mod documents;
pub mod srs_writer;
pub mod summarizer;
pub mod task_planner;

pub use documents::{combine_documents, UploadedDocument};
pub use srs_writer::{SrsRequest, SrsStream, SrsWriter};
pub use summarizer::{DocumentSummarizer, DocumentSummary, SummaryRequest};
pub use task_planner::{
    parse_task_plan, Criteria, Level, PlannedOutcome, PlannedTask, TaskPlan, TaskPlanRequest,
    TaskPlanResult, TaskPlanner,
};

use crate::context::BudgetDecision;
use crate::error::{Error, Result};

pub(crate) fn default_model() -> String {
    "gpt-4o".to_string()
}

/// Reject decisions that leave no output budget, before any provider call
pub(crate) fn ensure_room_for_output(decision: &BudgetDecision) -> Result<()> {
    if decision.is_anomalous() {
        return Err(Error::ContentTooLarge(format!(
            "prompt uses {} of {} tokens for {}, leaving no room for output",
            decision.prompt_tokens,
            decision.resolved_model.context_window,
            decision.resolved_model_name()
        )));
    }
    Ok(())
}
