//! Bounded retry with backoff for transport-level failures.
//!
//! Backoff has no jitter: the delay before a retry depends only on how many
//! attempts have already failed, which keeps retry timing reproducible in
//! tests.

use crate::transport::{RestRequest, RestResponse, Requester};
use async_trait::async_trait;
use redrest_core::TransportError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: BackoffFn,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);

    pub fn new<F>(max_retries: u32, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_retries,
            backoff: Arc::new(backoff),
        }
    }

    /// `base * e^attempt`, saturating instead of overflowing.
    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        Self::new(max_retries, move |attempt| {
            let secs = base.as_secs_f64() * f64::from(attempt).exp();
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        })
    }

    /// A single attempt, no retries.
    pub fn disabled() -> Self {
        Self::new(0, |_| Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after `attempt` (0-based) has failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 0-based attempt index. The last error is returned
    /// once retries are exhausted.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    trace!(attempt = attempt + 1, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_BASE_DELAY)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &"Fn(u32) -> Duration")
            .finish()
    }
}

/// Wraps a requester so every request goes through a [`RetryPolicy`].
///
/// Non-2xx responses are converted to [`TransportError::Http`] first, so a
/// custom requester reporting a 5xx status in an `Ok` response is retried
/// the same way as the HTTP transport's errors.
pub struct RetryingRequester {
    inner: Arc<dyn Requester>,
    policy: RetryPolicy,
}

impl RetryingRequester {
    pub fn new(inner: Arc<dyn Requester>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl fmt::Debug for RetryingRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingRequester")
            .field("inner", &"Arc<dyn Requester>")
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl Requester for RetryingRequester {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        let inner = &self.inner;
        self.policy
            .run(|_attempt| {
                let request = request.clone();
                async move { inner.send(request).await?.error_for_status() }
            })
            .await
    }
}
