//! Provider routing with retry and circuit breaking

use super::anthropic::AnthropicClient;
use super::circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig};
use super::config::{GenerationConfig, ProvidersConfig};
use super::openai::OpenAiCompatibleClient;
use super::provider::{ChatModel, ChunkStream, GenerationError, GenerationRequest};
use crate::metrics::METRICS;
use crate::models::ProviderKind;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Dispatches requests to the client for their provider family
pub struct ProviderRouter {
    clients: HashMap<ProviderKind, Arc<dyn ChatModel>>,
    breaker: CircuitBreaker,
    retry_attempts: usize,
    retry_backoff: Duration,
}

impl ProviderRouter {
    /// Router without clients
    pub fn new(config: &GenerationConfig) -> Self {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failures,
            reset_timeout: config.breaker_reset_timeout(),
        });

        Self {
            clients: HashMap::new(),
            breaker,
            retry_attempts: config.retry_attempts,
            retry_backoff: config.retry_backoff(),
        }
    }

    pub fn with_client(mut self, provider: ProviderKind, client: Arc<dyn ChatModel>) -> Self {
        self.clients.insert(provider, client);
        self
    }

    /// Router with an HTTP client for every provider family
    pub fn from_config(
        providers: &ProvidersConfig,
        generation: &GenerationConfig,
    ) -> Result<Self, GenerationError> {
        Ok(Self::new(generation)
            .with_client(
                ProviderKind::OpenAi,
                Arc::new(OpenAiCompatibleClient::new(providers.openai.clone())?),
            )
            .with_client(
                ProviderKind::Anthropic,
                Arc::new(AnthropicClient::new(providers.anthropic.clone())?),
            )
            .with_client(
                ProviderKind::GoogleGenai,
                Arc::new(OpenAiCompatibleClient::new(providers.google_genai.clone())?),
            )
            .with_client(
                ProviderKind::Google,
                Arc::new(OpenAiCompatibleClient::new(providers.google.clone())?),
            ))
    }

    pub fn breaker_stats(&self, provider: ProviderKind) -> BreakerStats {
        self.breaker.stats(provider)
    }

    fn client(&self, provider: ProviderKind) -> Result<Arc<dyn ChatModel>, GenerationError> {
        self.clients
            .get(&provider)
            .cloned()
            .ok_or(GenerationError::NotConfigured(provider))
    }

    /// Calculate exponential backoff
    fn calculate_backoff(&self, attempt: usize) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1) as u32);
        self.retry_backoff.saturating_mul(multiplier)
    }

    async fn call<T, F, Fut>(&self, request: &GenerationRequest, op: F) -> Result<T, GenerationError>
    where
        F: Fn(Arc<dyn ChatModel>) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let provider = request.provider_kind;
        let label = provider.as_str();
        let client = self.client(provider)?;

        if self.breaker.is_open(provider) {
            METRICS.generation_circuit_open.with_label_values(&[label]).inc();
            error!(provider = label, "Circuit breaker is open");
            return Err(GenerationError::CircuitOpen(provider));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = Instant::now();

            match op(client.clone()).await {
                Ok(value) => {
                    self.breaker.mark_success(provider);
                    METRICS.record_generation(label, true, start.elapsed().as_secs_f64());
                    debug!(provider = label, model = %request.model, attempt, "Provider call succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    METRICS.record_generation(label, false, start.elapsed().as_secs_f64());
                    if !e.is_retryable() {
                        warn!(provider = label, model = %request.model, error = %e, "Provider call failed");
                        return Err(e);
                    }

                    self.breaker.mark_failure(provider);
                    if attempt > self.retry_attempts || self.breaker.is_open(provider) {
                        error!(provider = label, attempt, error = %e, "Provider call failed after retries");
                        return Err(e);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    METRICS.generation_retries.with_label_values(&[label]).inc();
                    warn!(
                        provider = label,
                        attempt,
                        error = %e,
                        "Provider call failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Open a stream and wait for its first item, so failures before any
/// output surface as call errors
async fn open_stream(
    client: Arc<dyn ChatModel>,
    request: &GenerationRequest,
) -> Result<ChunkStream, GenerationError> {
    let mut chunks = client.stream(request).await?;
    match chunks.next().await {
        None => Ok(Box::pin(stream::empty())),
        Some(Err(e)) => Err(e),
        Some(Ok(first)) => Ok(Box::pin(stream::once(async move { Ok(first) }).chain(chunks))),
    }
}

#[async_trait]
impl ChatModel for ProviderRouter {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.call(request, |client| async move { client.complete(request).await })
            .await
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
        self.call(request, |client| open_stream(client, request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::circuit_breaker::BreakerState;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes, one per call
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn next(&self) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Stream("script exhausted".into())))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.next()
        }

        // The scripted outcome becomes the first stream item
        async fn stream(&self, _request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
            let first = self.next();
            let rest = vec![Ok(" more".to_string())];
            Ok(Box::pin(stream::once(async move { first }).chain(stream::iter(rest))))
        }
    }

    fn config(retry_attempts: usize, failures: usize) -> GenerationConfig {
        GenerationConfig {
            retry_attempts,
            retry_backoff_ms: 1,
            circuit_breaker_failures: failures,
            ..Default::default()
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            provider_kind: ProviderKind::OpenAi,
            model: "gpt-4o".to_string(),
            prompt: "hi".to_string(),
            max_tokens: 16,
            temperature: 0.2,
            location: "us-central1".to_string(),
        }
    }

    fn overloaded() -> GenerationError {
        GenerationError::upstream(529, "overloaded")
    }

    #[test]
    fn test_calculate_backoff() {
        let router = ProviderRouter::new(&GenerationConfig::default());
        assert_eq!(router.calculate_backoff(1), Duration::from_millis(500));
        assert_eq!(router.calculate_backoff(2), Duration::from_millis(1000));
        assert_eq!(router.calculate_backoff(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let model = Scripted::new(vec![Err(overloaded()), Ok("done".to_string())]);
        let router = ProviderRouter::new(&config(2, 5)).with_client(ProviderKind::OpenAi, model.clone());

        assert_eq!(router.complete(&request()).await.unwrap(), "done");
        assert_eq!(model.calls(), 2);
        assert_eq!(router.breaker_stats(ProviderKind::OpenAi).failure_count, 0);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let model = Scripted::new(vec![Err(GenerationError::upstream(
            400,
            r#"{"error":{"code":"context_length_exceeded","message":"too long"}}"#,
        ))]);
        let router = ProviderRouter::new(&config(2, 5)).with_client(ProviderKind::OpenAi, model.clone());

        let err = router.complete(&request()).await.unwrap_err();
        assert_eq!(err.code(), "context_length_exceeded");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let model = Scripted::new(vec![Err(overloaded()), Err(overloaded()), Err(overloaded())]);
        let router = ProviderRouter::new(&config(2, 10)).with_client(ProviderKind::OpenAi, model.clone());

        assert!(router.complete(&request()).await.is_err());
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_calling() {
        let model = Scripted::new(vec![Err(overloaded()), Err(overloaded()), Ok("never".to_string())]);
        let router = ProviderRouter::new(&config(0, 2)).with_client(ProviderKind::OpenAi, model.clone());

        assert!(router.complete(&request()).await.is_err());
        assert!(router.complete(&request()).await.is_err());
        assert_eq!(router.breaker_stats(ProviderKind::OpenAi).state, BreakerState::Open);

        let err = router.complete(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::CircuitOpen(ProviderKind::OpenAi)));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let router = ProviderRouter::new(&GenerationConfig::default());
        let err = router.complete(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(ProviderKind::OpenAi)));
    }

    #[tokio::test]
    async fn test_stream_retries_before_first_chunk() {
        let model = Scripted::new(vec![
            Err(GenerationError::Network("connection reset".into())),
            Ok("first".to_string()),
        ]);
        let router = ProviderRouter::new(&config(2, 5)).with_client(ProviderKind::OpenAi, model.clone());

        let chunks: Vec<String> = router
            .stream(&request())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["first", " more"]);
        assert_eq!(model.calls(), 2);
    }
}
