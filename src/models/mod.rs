//! Model registry
//!
//! Immutable catalog of known model deployments and their capability
//! envelope. Built once at startup and shared with the context budgeter.

pub mod catalog;
pub mod model_config;
pub mod registry;

pub use model_config::{ModelConfig, ModelRecord, ProviderKind};
pub use registry::{ModelRegistry, RegistryError};
