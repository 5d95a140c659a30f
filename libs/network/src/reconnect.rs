//! Reconnect policy for sink heads
//!
//! Exponential backoff with a bounded number of attempts. Each attempt is
//! bounded by the connect timeout; the delay starts at `initial_delay`, is
//! multiplied by `multiplier` after every failure and never exceeds
//! `max_delay`.

use crate::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Backoff configuration for re-establishing a head connection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after each failure
    pub multiplier: f64,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::from_millis(50),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ReconnectPolicy {
    /// Delay to sleep after `attempt` (1-based) has failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Run `connect` until it succeeds or the attempts are exhausted.
    ///
    /// Every attempt is wrapped in `connect_timeout`. Returns the number of
    /// attempts used on success.
    pub async fn run<F, Fut>(&self, target: &str, mut connect: F) -> Result<u32>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.connect_timeout, connect()).await {
                Ok(Ok(())) => {
                    debug!(target_addr = %target, attempt, "connected");
                    return Ok(attempt);
                }
                Ok(Err(e)) => {
                    warn!(target_addr = %target, attempt, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(target_addr = %target, attempt, "connect attempt timed out");
                    last_error = Some(TransportError::timeout(
                        format!("connect to {target}"),
                        self.connect_timeout.as_millis() as u64,
                    ));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.delay_for(attempt)).await;
            }
        }

        error!(target_addr = %target, attempts, "giving up on reconnect");
        Err(last_error.unwrap_or_else(|| {
            TransportError::connection("reconnect attempts exhausted", target)
        }))
    }
}
