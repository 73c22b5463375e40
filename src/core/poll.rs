//! Fixed-interval polling with an overall bound
//!
//! The charm store is eventually consistent: after a push, the only way to
//! learn the outcome is to ask again until the answer changes. Polling waits
//! a fixed interval between probes and gives up after a wall-clock timeout
//! or a maximum number of probes, whichever comes first.

use crate::core::error::PublishError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Options for polling behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay before every probe
    pub interval: Duration,
    /// Overall wall-clock bound
    pub timeout: Duration,
    /// Optional cap on the number of probes
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
            max_attempts: None,
        }
    }
}

/// A probe result that satisfied the poll condition
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Poll manager: sleep, probe, repeat until done or out of budget
///
/// # Examples
///
/// ```no_run
/// use charm_publisher::core::{PollManager, PollOptions};
///
/// # async fn example() -> Result<(), charm_publisher::PublishError> {
/// let poller = PollManager::new(PollOptions::default());
///
/// let outcome = poller
///     .poll_until(|| async { Ok(42) }, |value| *value == 42)
///     .await?;
///
/// assert_eq!(outcome.attempts, 1);
/// # Ok(())
/// # }
/// ```
pub struct PollManager {
    options: PollOptions,
}

impl PollManager {
    pub fn new(options: PollOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Repeatedly sleep for the interval and run `probe` until `done` accepts
    /// its result.
    ///
    /// A probe error ends polling immediately; polling is waiting on the
    /// store, not recovering from failures. When the budget runs out the
    /// result is `PublishError::PollTimeout`.
    pub async fn poll_until<F, Fut, T, D>(
        &self,
        mut probe: F,
        mut done: D,
    ) -> Result<PollOutcome<T>, PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PublishError>>,
        D: FnMut(&T) -> bool,
    {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            sleep(self.options.interval).await;

            let value = probe().await?;
            attempts += 1;

            if done(&value) {
                return Ok(PollOutcome { value, attempts });
            }

            let elapsed = start.elapsed();
            let out_of_attempts = self
                .options
                .max_attempts
                .is_some_and(|max| attempts >= max);

            if out_of_attempts || elapsed + self.options.interval > self.options.timeout {
                return Err(PublishError::PollTimeout { attempts, elapsed });
            }

            tracing::debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "still waiting");
        }
    }
}
