//! Circuit breaker + retry-with-backoff, adapted from the council crate's
//! resilience module for per-(provider, task) protection of LLM calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub success_threshold: u32,
    pub monitoring_window_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            success_threshold: 2,
            monitoring_window_ms: 60_000,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failures: Mutex<Vec<Instant>>,
    successes: Mutex<u32>,
    last_failure: RwLock<Option<Instant>>,
}

/// Marker distinguishing "the call itself failed" from "the circuit refused
/// to even try" so callers can tell the two apart (the latter should not
/// count toward a schema-retry budget).
pub enum CircuitError<E> {
    Open,
    Inner(E),
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            failures: Mutex::new(Vec::new()),
            successes: Mutex::new(0),
            last_failure: RwLock::new(None),
        }
    }

    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        {
            let state = self.state.read().await.clone();
            match state {
                CircuitState::Open => {
                    let last = *self.last_failure.read().await;
                    let recovered = last
                        .map(|t| t.elapsed() > Duration::from_millis(self.config.recovery_timeout_ms))
                        .unwrap_or(true);
                    if recovered {
                        *self.state.write().await = CircuitState::HalfOpen;
                        debug!("circuit transitioning to half-open for recovery probe");
                    } else {
                        return Err(CircuitError::Open);
                    }
                }
                CircuitState::HalfOpen | CircuitState::Closed => {}
            }
        }

        match operation().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure().await;
                Err(CircuitError::Inner(e))
            }
        }
    }

    async fn record_success(&self) {
        let mut successes = self.successes.lock().await;
        *successes += 1;
        let state = self.state.read().await.clone();
        if state == CircuitState::HalfOpen && *successes >= self.config.success_threshold {
            *self.state.write().await = CircuitState::Closed;
            *successes = 0;
        }
    }

    async fn record_failure(&self) {
        let mut failures = self.failures.lock().await;
        let now = Instant::now();
        let window_start = now - Duration::from_millis(self.config.monitoring_window_ms);
        failures.retain(|&t| t > window_start);
        failures.push(now);
        *self.last_failure.write().await = Some(now);
        if failures.len() >= self.config.failure_threshold as usize {
            *self.state.write().await = CircuitState::Open;
            warn!("circuit opened after {} failures in window", failures.len());
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        let mut delay = self.config.initial_delay_ms;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.config.max_attempts {
                        return Err(e);
                    }
                    let backoff = delay as f64 * self.config.backoff_multiplier;
                    delay = (backoff as u64).min(self.config.max_delay_ms);
                    let jitter = (delay as f64 * self.config.jitter_factor * fastrand::f64()) as u64;
                    sleep(Duration::from_millis(delay + jitter)).await;
                }
            }
        }
    }
}

/// Per-(provider, task) circuit breaker pool, created lazily.
#[derive(Default)]
pub struct BreakerPool {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(b) = self.breakers.read().await.get(key) {
            return b.clone();
        }
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        self.breakers
            .write()
            .await
            .insert(key.to_string(), breaker.clone());
        breaker
    }
}
