//! Prompt budgeting against model context windows
//!
//! Token measurement lives in [`token_accountant`]; the composition and
//! output-budget logic lives in [`budgeter`].

pub mod budgeter;
pub mod models;
pub mod token_accountant;
pub mod token_budget;

pub use budgeter::ContextBudgeter;
pub use models::{BudgetRequest, DocumentRequest};
pub use token_accountant::{TiktokenAccountant, TokenAccountant, TokenError, WordAccountant};
pub use token_budget::{
    BudgetDecision, BudgetError, BudgetOutcome, BudgetPolicy, FileStatus, PromptComposition,
    TruncationStrategy,
};
