//! Sequential retry loop around a single request.

use std::fmt;
use std::future::Future;

use tracing::warn;

use super::policy::RetryPolicy;

/// Error code reported when every attempt failed.
///
/// Kept distinct from the data store's own error codes.
pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";

const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Result of a retried request.
pub type RequestResult<T> = Result<T, RequestError>;

/// Failure reported after all attempts have been used up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
  /// Message of the last failed attempt
  pub message: String,
  /// Which attempt count was reached
  pub hint: String,
  /// Always [`RETRY_EXHAUSTED`]
  pub code: &'static str,
  pub attempts: u32,
  pub max_attempts: u32,
}

impl RequestError {
  fn exhausted(message: String, attempts: u32, max_attempts: u32) -> Self {
    Self {
      message,
      hint: format!("Failed after {} of {} attempts", attempts, max_attempts),
      code: RETRY_EXHAUSTED,
      attempts,
      max_attempts,
    }
  }
}

impl fmt::Display for RequestError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.message, self.hint)
  }
}

impl std::error::Error for RequestError {}

/// Run `operation` until it succeeds or the policy runs out of attempts.
///
/// Attempts never overlap: the next one starts only after the previous one
/// has settled and the backoff wait has elapsed. The wait is a tokio sleep, so
/// other tasks keep running meanwhile.
pub async fn execute_with_retry<T, E, F, Fut>(mut operation: F, policy: &RetryPolicy) -> RequestResult<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: fmt::Display,
{
  let max_attempts = policy.attempts();
  let mut delays = policy.delays();
  let mut attempt = 1;

  loop {
    let message = match operation().await {
      Ok(value) => return Ok(value),
      Err(e) => failure_message(&e),
    };

    // The schedule has one wait fewer than there are attempts
    let Some(delay) = delays.next() else {
      return Err(RequestError::exhausted(message, attempt, max_attempts));
    };

    warn!(
      attempt,
      next_attempt = attempt + 1,
      max_attempts,
      delay_ms = delay.as_millis() as u64,
      error = %message,
      "Request failed, retrying"
    );

    tokio::time::sleep(delay).await;
    attempt += 1;
  }
}

fn failure_message(error: &impl fmt::Display) -> String {
  let message = error.to_string();
  if message.trim().is_empty() {
    UNKNOWN_ERROR.to_string()
  } else {
    message
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;
  use tokio::time::Instant;
  use tracing::field::{Field, Visit};
  use tracing::{Event, Level, Subscriber};
  use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

  /// Records `(attempt, next_attempt)` of every warning event.
  #[derive(Clone, Default)]
  struct RetryWarnings(Arc<Mutex<Vec<(u64, u64)>>>);

  #[derive(Default)]
  struct AttemptFields {
    attempt: Option<u64>,
    next_attempt: Option<u64>,
  }

  impl Visit for AttemptFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
      match field.name() {
        "attempt" => self.attempt = Some(value),
        "next_attempt" => self.next_attempt = Some(value),
        _ => {}
      }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
  }

  impl<S: Subscriber> Layer<S> for RetryWarnings {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
      if *event.metadata().level() != Level::WARN {
        return;
      }
      let mut fields = AttemptFields::default();
      event.record(&mut fields);
      if let (Some(attempt), Some(next)) = (fields.attempt, fields.next_attempt) {
        self.0.lock().unwrap().push((attempt, next));
      }
    }
  }

  impl RetryWarnings {
    fn recorded(&self) -> Vec<(u64, u64)> {
      self.0.lock().unwrap().clone()
    }
  }

  fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
      .with_initial_delay(Duration::from_millis(10))
      .with_max_delay(Duration::from_millis(100))
  }

  #[tokio::test(start_paused = true)]
  async fn test_always_failing_operation_runs_max_attempts() {
    for max_attempts in 1..=5 {
      let mut calls = 0;
      let result: RequestResult<()> = execute_with_retry(
        || {
          calls += 1;
          async { Err("connection reset") }
        },
        &fast_policy(max_attempts),
      )
      .await;

      assert!(result.is_err());
      assert_eq!(calls, max_attempts);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_success_short_circuits() {
    let mut calls = 0;
    let result = execute_with_retry(
      || {
        calls += 1;
        let n = calls;
        async move {
          if n < 3 {
            Err(format!("attempt {} failed", n))
          } else {
            Ok(vec!["a", "b"])
          }
        }
      },
      &fast_policy(5),
    )
    .await;

    assert_eq!(result, Ok(vec!["a", "b"]));
    assert_eq!(calls, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_instant_success_incurs_no_delay() {
    let start = Instant::now();
    let result = execute_with_retry(|| async { Ok::<_, String>(42) }, &RetryPolicy::default()).await;

    assert_eq!(result, Ok(42));
    assert_eq!(start.elapsed(), Duration::ZERO);
  }

  #[tokio::test(start_paused = true)]
  async fn test_waits_follow_backoff_schedule() {
    let policy = RetryPolicy::new(6);
    let start = Instant::now();
    let mut started_at = Vec::new();

    let result: RequestResult<()> = execute_with_retry(
      || {
        started_at.push(start.elapsed());
        async { Err("timeout") }
      },
      &policy,
    )
    .await;

    assert!(result.is_err());
    let gaps: Vec<u128> = started_at
      .windows(2)
      .map(|w| (w[1] - w[0]).as_millis())
      .collect();
    assert_eq!(gaps, vec![1000, 2000, 4000, 8000, 10_000]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_no_wait_after_last_attempt() {
    let start = Instant::now();
    let result: RequestResult<()> =
      execute_with_retry(|| async { Err("down") }, &RetryPolicy::default()).await;

    assert!(result.is_err());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3000));
    assert!(elapsed < Duration::from_millis(4000));
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhaustion_reports_last_message() {
    let mut calls = 0;
    let result: RequestResult<()> = execute_with_retry(
      || {
        calls += 1;
        let n = calls;
        async move { Err(format!("failure #{}", n)) }
      },
      &fast_policy(3),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.message, "failure #3");
    assert_eq!(err.code, RETRY_EXHAUSTED);
    assert_eq!(err.attempts, 3);
    assert_eq!(err.max_attempts, 3);
    assert_eq!(err.hint, "Failed after 3 of 3 attempts");
  }

  #[tokio::test]
  async fn test_single_attempt_fails_immediately() {
    let start = std::time::Instant::now();
    let result: RequestResult<()> =
      execute_with_retry(|| async { Err("nope") }, &RetryPolicy::new(1)).await;

    assert_eq!(result.unwrap_err().attempts, 1);
    assert!(start.elapsed() < Duration::from_millis(500));
  }

  #[tokio::test(start_paused = true)]
  async fn test_empty_error_message_is_replaced() {
    let result: RequestResult<()> =
      execute_with_retry(|| async { Err("") }, &fast_policy(2)).await;

    assert_eq!(result.unwrap_err().message, UNKNOWN_ERROR);
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_payload_inside_ok_is_not_retried() {
    let mut calls = 0;
    let result = execute_with_retry(
      || {
        calls += 1;
        async { Ok::<Result<u32, &str>, String>(Err("row not found")) }
      },
      &fast_policy(3),
    )
    .await;

    assert_eq!(result, Ok(Err("row not found")));
    assert_eq!(calls, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_warns_before_each_retry_only() {
    let warnings = RetryWarnings::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let result: RequestResult<()> =
      execute_with_retry(|| async { Err("unreachable") }, &fast_policy(4)).await;

    assert!(result.is_err());
    assert_eq!(warnings.recorded(), vec![(1, 2), (2, 3), (3, 4)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_no_warning_for_single_attempt_or_success() {
    let warnings = RetryWarnings::default();
    let subscriber = tracing_subscriber::registry().with(warnings.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let failed: RequestResult<()> =
      execute_with_retry(|| async { Err("unreachable") }, &RetryPolicy::new(1)).await;
    let ok = execute_with_retry(|| async { Ok::<_, String>(1) }, &fast_policy(3)).await;

    assert!(failed.is_err());
    assert_eq!(ok, Ok(1));
    assert!(warnings.recorded().is_empty());
  }

  #[test]
  fn test_display_includes_hint() {
    let err = RequestError::exhausted("boom".to_string(), 2, 2);
    assert_eq!(err.to_string(), "boom (Failed after 2 of 2 attempts)");
  }
}
