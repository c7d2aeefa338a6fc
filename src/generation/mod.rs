//! Text generation against the supported provider families
//!
//! Each family gets an HTTP client implementing [`ChatModel`]; the
//! [`ProviderRouter`] picks one per request and wraps the call in retries
//! and a per-provider circuit breaker.

pub mod anthropic;
pub mod circuit_breaker;
pub mod config;
pub mod openai;
pub mod provider;
pub mod router;
pub mod streaming;

pub use circuit_breaker::{BreakerState, BreakerStats, CircuitBreaker, CircuitBreakerConfig};
pub use config::{EndpointConfig, GenerationConfig, ProvidersConfig};
pub use provider::{ChatModel, ChunkStream, GenerationError, GenerationRequest};
pub use router::ProviderRouter;
pub use streaming::{strip_fences, FenceStripper};
