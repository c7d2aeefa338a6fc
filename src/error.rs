//! Crate-level error type

use thiserror::Error;

use crate::context::{BudgetError, TokenError};
use crate::conversation::StoreError;
use crate::generation::GenerationError;
use crate::models::RegistryError;

/// Errors surfaced by the service layers
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Measurement(#[from] TokenError),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Conversation(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Content too large: {0}")]
    ContentTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
