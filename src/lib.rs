//! SprintSpeed
//!
//! Generates software requirements documents and task plans with hosted
//! LLMs. Every prompt is fitted to the target model's context window by
//! the [`context::ContextBudgeter`] before a provider is called.

pub mod agents;
pub mod api;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod logging;
pub mod metrics;
pub mod models;

pub use error::{Error, Result};
