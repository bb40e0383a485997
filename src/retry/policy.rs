//! Retry policy and the delay schedule it produces.

use std::time::Duration;

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
  /// Total number of tries, not retries. Zero is treated as one.
  pub max_attempts: u32,
  /// Wait before the second attempt
  pub initial_delay: Duration,
  /// Upper bound for any single wait
  pub max_delay: Duration,
  /// Multiplier applied to the wait after each failed attempt (>= 1)
  pub backoff_factor: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay: Duration::from_millis(1000),
      max_delay: Duration::from_millis(10_000),
      backoff_factor: 2.0,
    }
  }
}

impl RetryPolicy {
  /// Create a policy with the given attempt count and default delays.
  pub fn new(max_attempts: u32) -> Self {
    Self {
      max_attempts,
      ..Self::default()
    }
  }

  pub fn with_initial_delay(mut self, delay: Duration) -> Self {
    self.initial_delay = delay;
    self
  }

  pub fn with_max_delay(mut self, delay: Duration) -> Self {
    self.max_delay = delay;
    self
  }

  pub fn with_backoff_factor(mut self, factor: f64) -> Self {
    self.backoff_factor = factor;
    self
  }

  /// Number of attempts actually made, never less than one.
  pub fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }

  /// Wait before the second attempt, clamped to `max_delay`.
  pub fn first_delay(&self) -> Duration {
    self.initial_delay.min(self.max_delay)
  }

  /// Wait that follows `current`, grown by the backoff factor and capped.
  pub fn next_delay(&self, current: Duration) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * self.factor())
      .unwrap_or(self.max_delay)
      .min(self.max_delay)
  }

  /// The full schedule of waits for a run where every attempt fails.
  ///
  /// Yields `attempts() - 1` durations: there is no wait after the last try.
  pub fn delays(&self) -> Delays<'_> {
    Delays {
      policy: self,
      next: self.first_delay(),
      remaining: self.attempts() - 1,
    }
  }

  fn factor(&self) -> f64 {
    if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
      self.backoff_factor
    } else {
      1.0
    }
  }
}

/// Iterator over the waits of a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Delays<'a> {
  policy: &'a RetryPolicy,
  next: Duration,
  remaining: u32,
}

impl Iterator for Delays<'_> {
  type Item = Duration;

  fn next(&mut self) -> Option<Duration> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    let current = self.next;
    self.next = self.policy.next_delay(current);
    Some(current)
  }
}
