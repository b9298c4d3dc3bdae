//! Ordered-candidate dispatch.
//!
//! The single retry/fallback loop shared by the provider-level dispatcher and
//! the model-level selector. Candidates are tried strictly in the given order,
//! one in-flight call at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::classifier::ErrorClassifier;
use crate::error::{DispatchError, ProviderError};
use crate::executor::ServiceExecutor;
use crate::metrics;
use crate::result::RetryAttempt;
use crate::retry::RetryPolicy;
use crate::stats::StatsTracker;

/// One entry of a chain: who to call and with what.
#[derive(Clone)]
pub struct ChainCandidate {
    pub name: String,
    pub executor: Arc<dyn ServiceExecutor>,
    pub request: Value,
}

impl ChainCandidate {
    pub fn new(name: impl Into<String>, executor: Arc<dyn ServiceExecutor>, request: Value) -> Self {
        Self {
            name: name.into(),
            executor,
            request,
        }
    }
}

/// Attempt-loop settings applied to every candidate.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub retry: RetryPolicy,
    pub timeout: Duration,
    /// Give up on a candidate after this many timeouts in a row (0 = never)
    pub max_consecutive_timeouts: u32,
}

impl ChainSettings {
    /// One try per candidate, no inter-attempt delay.
    pub fn single_try(timeout: Duration) -> Self {
        Self {
            retry: RetryPolicy::single_attempt(),
            timeout,
            max_consecutive_timeouts: 0,
        }
    }
}

/// Everything the loop learned, before it is shaped into a public result.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub data: Option<Value>,
    pub error: Option<DispatchError>,
    /// Candidate that succeeded, or the last one tried
    pub used: Option<String>,
    pub attempts: u32,
    pub fallback_used: bool,
    pub elapsed: Duration,
    pub history: Vec<RetryAttempt>,
}

impl ChainOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }
}

/// Try `candidates` in order until one succeeds.
///
/// Within a candidate: validate, race the call against the timeout, classify
/// any failure, then retry (after the policy's delay) only if the failure is
/// retryable. A failure that is not fallback-eligible ends the whole chain.
pub async fn run_chain(
    candidates: &[ChainCandidate],
    settings: &ChainSettings,
    classifier: &ErrorClassifier,
    stats: &StatsTracker,
) -> ChainOutcome {
    let started = Instant::now();
    let mut outcome = ChainOutcome {
        data: None,
        error: None,
        used: None,
        attempts: 0,
        fallback_used: false,
        elapsed: Duration::ZERO,
        history: Vec::new(),
    };

    let Some(origin) = candidates.first().map(|c| c.name.clone()) else {
        outcome.error = Some(DispatchError::exhausted("no candidates to try", 0));
        return outcome;
    };

    let timeout_ms = settings.timeout.as_millis() as u64;
    let mut last_error: Option<String> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        if index > 0 {
            outcome.fallback_used = true;
            metrics::record_fallback(&origin, &candidate.name);
            info!(
                from = %origin,
                to = %candidate.name,
                "Falling back to next candidate"
            );
        }
        outcome.used = Some(candidate.name.clone());

        if !candidate.executor.validate_input(&candidate.request) {
            let message = format!("request rejected by {} input validation", candidate.name);
            warn!(provider = %candidate.name, "{}", message);
            outcome.attempts += 1;
            outcome.history.push(RetryAttempt {
                attempt: 1,
                provider: candidate.name.clone(),
                error: message.clone(),
                timestamp: Utc::now(),
                retryable: false,
            });
            outcome.error = Some(DispatchError::validation(format!(
                "{} after {} attempt(s)",
                message, outcome.attempts
            )));
            outcome.elapsed = started.elapsed();
            return outcome;
        }

        let mut consecutive_timeouts = 0u32;

        for attempt in 1..=settings.retry.max_attempts {
            outcome.attempts += 1;

            let span = info_span!("dispatch_attempt", provider = %candidate.name, attempt);
            let call_started = Instant::now();
            let result = match tokio::time::timeout(
                settings.timeout,
                candidate.executor.execute(&candidate.request),
            )
            .instrument(span)
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout(timeout_ms)),
            };
            let latency = call_started.elapsed();

            let err = match result {
                Ok(data) => {
                    stats.record_success(&candidate.name, latency).await;
                    metrics::record_attempt(&candidate.name, "success", latency);
                    debug!(
                        provider = %candidate.name,
                        attempt,
                        latency_ms = latency.as_millis() as u64,
                        "Provider call succeeded"
                    );
                    outcome.data = Some(data);
                    outcome.elapsed = started.elapsed();
                    return outcome;
                }
                Err(err) => err,
            };

            stats.record_failure(&candidate.name, latency).await;
            metrics::record_attempt(
                &candidate.name,
                if err.is_timeout() { "timeout" } else { "failure" },
                latency,
            );

            let class = classifier.classify(&err);
            warn!(
                provider = %candidate.name,
                attempt,
                max_attempts = settings.retry.max_attempts,
                kind = ?class.kind,
                retryable = class.retryable,
                "Provider call failed: {}",
                err
            );

            outcome.history.push(RetryAttempt {
                attempt,
                provider: candidate.name.clone(),
                error: err.message.clone(),
                timestamp: Utc::now(),
                retryable: class.retryable,
            });
            last_error = Some(err.message.clone());

            if !class.fallback_eligible {
                outcome.error = Some(DispatchError::validation(format!(
                    "{} (rejected by {} after {} attempt(s))",
                    err.message, candidate.name, outcome.attempts
                )));
                outcome.elapsed = started.elapsed();
                return outcome;
            }

            if !class.retryable {
                break;
            }

            if err.is_timeout() {
                consecutive_timeouts += 1;
            } else {
                consecutive_timeouts = 0;
            }
            if settings.max_consecutive_timeouts > 0
                && consecutive_timeouts >= settings.max_consecutive_timeouts
            {
                warn!(
                    provider = %candidate.name,
                    consecutive_timeouts,
                    "Provider keeps timing out, moving on"
                );
                break;
            }

            if settings.retry.has_attempts_left(attempt) {
                let delay = settings.retry.next_delay(attempt);
                debug!(
                    provider = %candidate.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    metrics::record_exhausted(&origin);
    outcome.error = Some(DispatchError::exhausted(
        last_error.unwrap_or_else(|| "unknown error".to_string()),
        outcome.attempts,
    ));
    outcome.elapsed = started.elapsed();
    outcome
}
