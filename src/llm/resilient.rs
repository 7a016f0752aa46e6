use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::backend::{CompletionBackend, EmbeddingBackend, Prompt, ResponseFormat};
use crate::error::LlmError;

/// Timeout, retry and circuit breaker settings for capability calls
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Upper bound for a single call
    pub call_timeout: Duration,
    /// Retries after the first attempt, transient errors only
    pub max_retries: u32,
    /// Delay before the first retry, doubled each time
    pub initial_backoff: Duration,
    /// Cap for the retry delay
    pub max_backoff: Duration,
    /// Consecutive transient failures that open the breaker
    pub breaker_threshold: u32,
    /// How long the breaker stays open before a trial call is let through
    pub breaker_cooldown: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(120),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Start of the single half-open trial call, if one is running
    trial_started: Option<Instant>,
}

/// Wraps a capability with per-call timeout, bounded retry and a circuit breaker
///
/// Implements the same traits as the wrapped backend, so pipeline code never
/// sees the retry mechanics. Permanent errors are returned immediately and do
/// not count towards the breaker.
pub struct ResilientBackend<B> {
    inner: B,
    config: ResilienceConfig,
    breaker: Mutex<BreakerState>,
}

impl<B> ResilientBackend<B> {
    pub fn new(inner: B, config: ResilienceConfig) -> Self {
        Self {
            inner,
            config,
            breaker: Mutex::new(BreakerState::default()),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, operation: &str, mut attempt_call: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0u32;

        loop {
            self.check_breaker()?;
            attempt += 1;

            let result = match tokio::time::timeout(self.config.call_timeout, attempt_call()).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.config.call_timeout)),
            };

            let err = match result {
                Ok(value) => {
                    self.record_success();
                    if attempt > 1 {
                        debug!("{}: succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                self.release_trial();
                return Err(err);
            }
            self.record_failure();

            if attempt > self.config.max_retries {
                warn!("{}: giving up after {} attempts: {}", operation, attempt, err);
                return Err(err);
            }

            warn!(
                "{}: transient failure on attempt {}, retrying in {}ms: {}",
                operation,
                attempt,
                backoff.as_millis(),
                err
            );
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }

    fn check_breaker(&self) -> Result<(), LlmError> {
        let mut state = self.breaker.lock().unwrap_or_else(|e| e.into_inner());
        let Some(opened_at) = state.opened_at else {
            return Ok(());
        };
        if opened_at.elapsed() < self.config.breaker_cooldown {
            return Err(LlmError::CircuitOpen);
        }
        // Half-open: one trial at a time. A trial older than the call timeout
        // was abandoned by its caller and no longer holds the slot.
        let trial_running = state
            .trial_started
            .is_some_and(|started| started.elapsed() < self.config.call_timeout);
        if trial_running {
            return Err(LlmError::CircuitOpen);
        }
        debug!("Circuit breaker half-open, allowing one trial call");
        state.trial_started = Some(Instant::now());
        Ok(())
    }

    fn record_success(&self) {
        let mut state = self.breaker.lock().unwrap_or_else(|e| e.into_inner());
        *state = BreakerState::default();
    }

    fn record_failure(&self) {
        let mut state = self.breaker.lock().unwrap_or_else(|e| e.into_inner());
        state.consecutive_failures += 1;
        if state.trial_started.take().is_some() {
            warn!("Circuit breaker trial call failed, reopening");
            state.opened_at = Some(Instant::now());
        } else if state.opened_at.is_none()
            && state.consecutive_failures >= self.config.breaker_threshold
        {
            warn!(
                "Circuit breaker opened after {} consecutive failures, cooldown {}s",
                state.consecutive_failures,
                self.config.breaker_cooldown.as_secs()
            );
            state.opened_at = Some(Instant::now());
        }
    }

    /// A permanent error ends a trial without deciding the breaker state
    fn release_trial(&self) {
        let mut state = self.breaker.lock().unwrap_or_else(|e| e.into_inner());
        state.trial_started = None;
    }
}

impl<B: CompletionBackend> CompletionBackend for ResilientBackend<B> {
    async fn complete(&self, prompt: &Prompt, format: ResponseFormat) -> Result<String, LlmError> {
        self.call("complete", || self.inner.complete(prompt, format))
            .await
    }
}

impl<B: EmbeddingBackend> EmbeddingBackend for ResilientBackend<B> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.call("embed", || self.inner.embed(text)).await
    }
}
