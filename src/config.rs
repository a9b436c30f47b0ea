use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::store::StoreError;

const LOG_TARGET: &str = "rps_duel::config";

/// Bounded retry for store writes. Only transient failures are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(
                        target: LOG_TARGET,
                        operation,
                        attempt,
                        error = %err,
                        "store operation failed; retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Timing and policy knobs for one match client.
///
/// All round timing is expressed in `unit`s (one second by default) so tests
/// and bots can run the same schedule faster.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    pub unit: Duration,
    pub selection_units: u32,
    pub reveal_countdown_units: u32,
    pub session_ttl: Duration,
    pub expiry_check_interval: Duration,
    pub retry: RetryPolicy,
    /// Signal readiness for the next round as soon as the current one is shown.
    pub auto_next_round: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            selection_units: 30,
            reveal_countdown_units: 3,
            session_ttl: Duration::from_secs(5 * 60),
            expiry_check_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            auto_next_round: false,
        }
    }
}

impl MatchConfig {
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_auto_next_round(mut self, enabled: bool) -> Self {
        self.auto_next_round = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn units(&self, count: u32) -> Duration {
        self.unit * count
    }
}
