//! Step runner: named, independently retriable units of work.
//!
//! The durable-execution engine driving the pipelines is an external
//! collaborator; what the pipelines rely on is the contract modeled here.
//! A [`PipelineRun`] executes named steps with at-least-once semantics:
//! a step body runs until it succeeds (transient failures retry with
//! exponential backoff) and its result is memoized, so re-driving the same
//! run never re-executes a completed step.
//!
//! Step results cross the boundary as JSON — explicit inputs and outputs,
//! no captured mutable state — because a resumed run may not share memory
//! with the attempt that produced them.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::OrchestratorConfig;
use crate::error::{RagError, Result};

/// Retry policy applied to transient step failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per step (first try included).
    pub max_attempts: u32,
    /// First backoff delay; doubles per retry, capped at 32x.
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
        }
    }

    fn backoff(&self, retry: u32) -> Duration {
        // 1x, 2x, 4x, ... capped at 2^5.
        self.base_backoff * (1 << retry.min(5))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// One pipeline invocation. Holds the memo table for its steps.
pub struct PipelineRun {
    policy: RetryPolicy,
    memo: Mutex<HashMap<String, serde_json::Value>>,
}

impl PipelineRun {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Execute the named step, or return its memoized result if it already
    /// completed in this run.
    ///
    /// The body is re-invoked on transient failures
    /// ([`RagError::is_transient`]) up to the policy's attempt budget, with
    /// exponential backoff between attempts. Fatal errors surface
    /// immediately.
    pub async fn step<T, F, Fut>(&self, name: &str, body: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        {
            let memo = self.memo.lock().await;
            if let Some(value) = memo.get(name) {
                debug!(step = name, "returning memoized step result");
                return serde_json::from_value(value.clone())
                    .map_err(|e| RagError::State(format!("restore '{}': {}", name, e)));
            }
        }

        let mut attempt = 0u32;
        let output = loop {
            attempt += 1;
            match body().await {
                Ok(output) => break output,
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt - 1);
                    warn!(
                        step = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        debug!(step = name, attempt, "step completed");

        let value = serde_json::to_value(&output)
            .map_err(|e| RagError::State(format!("memoize '{}': {}", name, e)))?;
        self.memo.lock().await.insert(name.to_string(), value);

        Ok(output)
    }
}
