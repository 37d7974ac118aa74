// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff with uniform jitter.
///
/// Attempt `n` (1-based) that fails with a retryable error is followed by a pause of
/// `delay * backoff^(n-1) + U[-jitter, +jitter]`, never less than zero.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (at least one is always made).
    pub tries: u32,
    /// Pause after the first failed attempt, before jitter.
    pub delay: Duration,
    /// Multiplier applied to the pause after each further failed attempt.
    pub backoff: f64,
    /// Half-width of the uniform jitter added to each pause.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 4,
            delay: Duration::from_secs(1),
            backoff: 2.0,
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(tries: u32, delay: Duration, backoff: f64, jitter: Duration) -> Self {
        Self {
            tries,
            delay,
            backoff,
            jitter,
        }
    }

    /// A policy that makes a single attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0, Duration::ZERO)
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.delay.as_secs_f64() * self.backoff.powi(exponent);
        let jitter = self.jitter.as_secs_f64();
        let offset = if jitter > 0.0 {
            rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        let seconds = base + offset;
        if seconds.is_nan() || seconds <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
        }
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable` rejects, or the
/// policy runs out of tries. The last error is returned unchanged.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    let tries = policy.tries.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < tries && is_retryable(&e) => {
                let delay = policy.delay_for(attempt, &mut rand::thread_rng());
                warn!(
                    attempt,
                    tries,
                    delay_secs = delay.as_secs_f64(),
                    "retrying: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
