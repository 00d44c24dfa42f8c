//! Caller-side retry policy for reads.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::error::ClientResult;

/// Exponential backoff applied by callers of the remote client.
///
/// The transport itself never retries, and this policy is only applied to
/// list reads. Mutations are never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts including the first one
  pub max_attempts: u32,
  /// Delay before the first retry, in milliseconds
  pub delay_ms: u64,
  /// Multiplier applied to the delay after each retry
  pub backoff: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      delay_ms: 1000,
      backoff: 1.5,
    }
  }
}

impl RetryPolicy {
  /// A policy that makes exactly one attempt.
  pub fn none() -> Self {
    Self {
      max_attempts: 1,
      ..Self::default()
    }
  }

  /// Delay before retry number `retry` (1-based).
  pub fn delay_for(&self, retry: u32) -> Duration {
    let factor = self.backoff.max(1.0).powi(retry.saturating_sub(1) as i32);
    Duration::from_millis((self.delay_ms as f64 * factor) as u64).min(Duration::from_secs(30))
  }

  /// Run `op` until it succeeds, fails with a non-retryable error, or the
  /// attempts are used up.
  pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> ClientResult<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_retryable() && attempt < max_attempts => {
          let backoff = self.delay_for(attempt);
          warn!(
            error = %e,
            what,
            attempt,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            "retrying request"
          );
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
