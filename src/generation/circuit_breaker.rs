//! Per-provider circuit breaker

use crate::models::ProviderKind;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,   // Normal operation
    Open,     // Failing, reject requests
    HalfOpen, // Testing if the provider recovered
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    failure_count: usize,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            opened_at: None,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Tracks consecutive failures per provider
#[derive(Debug)]
pub struct CircuitBreaker {
    breakers: Mutex<HashMap<ProviderKind, BreakerEntry>>,
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    // A poisoned lock still holds usable counters
    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderKind, BreakerEntry>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether calls to `provider` should be rejected. An open circuit past
    /// its reset timeout moves to half-open and lets a trial call through.
    pub fn is_open(&self, provider: ProviderKind) -> bool {
        let mut breakers = self.lock();
        let entry = breakers.entry(provider).or_insert_with(BreakerEntry::new);

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => false,
            BreakerState::Open => match entry.opened_at {
                Some(opened_at) if opened_at.elapsed() >= self.config.reset_timeout => {
                    entry.state = BreakerState::HalfOpen;
                    false
                }
                _ => true,
            },
        }
    }

    pub fn mark_success(&self, provider: ProviderKind) {
        let mut breakers = self.lock();
        breakers.insert(provider, BreakerEntry::new());
    }

    pub fn mark_failure(&self, provider: ProviderKind) {
        let mut breakers = self.lock();
        let entry = breakers.entry(provider).or_insert_with(BreakerEntry::new);

        entry.failure_count += 1;
        entry.last_failure = Some(Instant::now());

        // A failed trial call reopens immediately
        if entry.state == BreakerState::HalfOpen
            || entry.failure_count >= self.config.failure_threshold
        {
            if entry.state != BreakerState::Open {
                warn!(provider = %provider, failures = entry.failure_count, "Circuit opened");
            }
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, provider: ProviderKind) -> BreakerState {
        self.lock()
            .get(&provider)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    pub fn stats(&self, provider: ProviderKind) -> BreakerStats {
        match self.lock().get(&provider) {
            Some(entry) => BreakerStats {
                state: entry.state,
                failure_count: entry.failure_count,
                last_failure: entry.last_failure,
            },
            None => BreakerStats {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            },
        }
    }

    pub fn reset(&self, provider: ProviderKind) {
        self.lock().remove(&provider);
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failure_count: usize,
    pub last_failure: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI: ProviderKind = ProviderKind::OpenAi;

    fn breaker(threshold: usize, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    #[test]
    fn test_closed_by_default() {
        let breaker = CircuitBreaker::default();
        assert!(!breaker.is_open(OPENAI));
        assert_eq!(breaker.state(OPENAI), BreakerState::Closed);
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(3, Duration::from_secs(30));

        breaker.mark_failure(OPENAI);
        breaker.mark_failure(OPENAI);
        assert!(!breaker.is_open(OPENAI));

        breaker.mark_failure(OPENAI);
        assert!(breaker.is_open(OPENAI));
        assert_eq!(breaker.state(OPENAI), BreakerState::Open);
        // other providers unaffected
        assert!(!breaker.is_open(ProviderKind::Anthropic));
    }

    #[test]
    fn test_success_resets() {
        let breaker = breaker(3, Duration::from_secs(30));
        breaker.mark_failure(OPENAI);
        breaker.mark_failure(OPENAI);
        breaker.mark_success(OPENAI);

        let stats = breaker.stats(OPENAI);
        assert_eq!(stats.state, BreakerState::Closed);
        assert_eq!(stats.failure_count, 0);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let breaker = breaker(2, Duration::from_millis(100));
        breaker.mark_failure(OPENAI);
        breaker.mark_failure(OPENAI);
        assert!(breaker.is_open(OPENAI));

        std::thread::sleep(Duration::from_millis(150));

        assert!(!breaker.is_open(OPENAI));
        assert_eq!(breaker.state(OPENAI), BreakerState::HalfOpen);

        // failed trial reopens
        breaker.mark_failure(OPENAI);
        assert!(breaker.is_open(OPENAI));
    }

    #[test]
    fn test_reset() {
        let breaker = breaker(1, Duration::from_secs(30));
        breaker.mark_failure(OPENAI);
        breaker.reset(OPENAI);
        assert_eq!(breaker.stats(OPENAI).failure_count, 0);
        assert!(breaker.stats(OPENAI).last_failure.is_none());
    }
}
