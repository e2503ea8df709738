//! Bounded fixed-interval polling.
//!
//! Every wait on asynchronously rendered content goes through [`poll_until`]:
//! at most `max_attempts` checks, `interval` apart, first check immediate.

use crate::config::CrawlerConfig;
use crate::session::SessionError;
use std::future::Future;
use std::iter::Take;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.poll_interval(), config.poll_max_attempts)
    }

    /// Delays between attempts; one fewer than the number of attempts.
    fn strategy(&self) -> Take<FixedInterval> {
        FixedInterval::new(self.interval).take(self.max_attempts.saturating_sub(1) as usize)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Why a single poll attempt did not succeed.
#[derive(Debug)]
pub enum PollError {
    /// Page not in the wanted state yet; try again.
    Pending,
    /// The session itself failed; retrying will not help.
    Session(SessionError),
}

impl From<SessionError> for PollError {
    fn from(e: SessionError) -> Self {
        PollError::Session(e)
    }
}

/// Run `check` until it returns `Ok`, a non-retryable error, or the policy's
/// attempt budget runs out. On exhaustion the last `Pending` is returned.
pub async fn poll_until<T, F, Fut>(policy: &PollPolicy, check: F) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PollError>>,
{
    RetryIf::spawn(policy.strategy(), check, |e: &PollError| {
        matches!(e, PollError::Pending)
    })
    .await
}
