//! Timeout-bounded polling
//!
//! [`Wait::until`] polls a check until it yields a value or the timeout
//! elapses. A check that errors counts as "not yet", unless the error means
//! the session itself is gone; those propagate immediately.

use std::future::Future;
use tokio::time::{Duration, Instant};
use tracing::trace;

use crate::Result;

/// Polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    timeout: Duration,
    poll_interval: Duration,
}

impl Wait {
    /// Poll every `poll_interval` for at most `timeout`
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Same interval, different timeout
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll `check` until it returns `Some`.
    ///
    /// The check runs at least once, even with a zero timeout. Returns
    /// `Ok(None)` when the timeout elapses first. Each check call is itself
    /// bounded by the remaining time, so a hung backend call cannot stretch
    /// the wait by more than one poll interval.
    pub async fn until<T, F, Fut>(&self, mut check: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = Instant::now() + self.timeout;

        loop {
            let budget = deadline
                .saturating_duration_since(Instant::now())
                .max(self.poll_interval);

            match tokio::time::timeout(budget, check()).await {
                Ok(Ok(Some(value))) => return Ok(Some(value)),
                Ok(Ok(None)) => {}
                Ok(Err(e)) if e.is_session_fatal() => return Err(e),
                Ok(Err(e)) => trace!("Check failed, retrying: {}", e),
                Err(_) => trace!("Check exceeded remaining budget"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Poll a boolean condition; `true` once it held within the timeout
    pub async fn until_true<F, Fut>(&self, mut condition: F) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let found = self
            .until(|| {
                let check = condition();
                async move { Ok::<_, crate::Error>(check.await?.then_some(())) }
            })
            .await?;
        Ok(found.is_some())
    }
}
