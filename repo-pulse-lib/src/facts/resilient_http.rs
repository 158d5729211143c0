//! Rate-aware retry of single remote calls using retry and timeout middleware.
//!
//! Wraps an operation with [`seatbelt`] retry and timeout middleware so that transient
//! failures (rate limiting, timeouts, 5xx, dropped connections) are masked automatically.
//! Each attempt is a fresh invocation of the operation; nothing carries over between attempts.

use super::ApiError;
use core::time::Duration;
use layered::{Execute, Service, Stack};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;

const LOG_TARGET: &str = "     retry";

/// Default timeout for a single API request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of retries (on top of the original request).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff between retries.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on a server-requested wait (`Retry-After` or rate limit reset).
const MAX_SERVER_REQUESTED_DELAY: Duration = Duration::from_secs(15 * 60);

/// How hard to try before giving up on a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries on top of the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry; doubles for every further retry.
    pub base_delay: Duration,

    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Classify an attempt's outcome for retry purposes.
fn should_retry<T>(result: &Result<T, ApiError>) -> RecoveryInfo {
    match result {
        Err(e) if e.is_retriable() => e.retry_after().map_or_else(RecoveryInfo::retry, |delay| {
            RecoveryInfo::retry().delay(delay.min(MAX_SERVER_REQUESTED_DELAY))
        }),

        // Success, or a permanent failure that another attempt won't fix.
        _ => RecoveryInfo::never(),
    }
}

/// Execute a zero-argument async operation with automatic retry and timeout.
///
/// Retriable failures are retried up to `policy.max_retries` times with exponential backoff.
/// The error of the last attempt, or the first permanent error, is returned unmodified.
///
/// `name` is used for logging identification.
pub async fn with_retry<Out, Fut, F>(name: &'static str, policy: RetryPolicy, operation: F) -> Result<Out, ApiError>
where
    Out: Send + 'static,
    Fut: Future<Output = Result<Out, ApiError>> + Send,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
{
    let clock = Clock::new_tokio();
    let context = ResilienceContext::new(&clock).name(name);

    let service = (
        Retry::layer("retry", &context)
            .clone_input()
            .recovery_with(|result: &Result<Out, ApiError>, _| should_retry(result))
            .max_retry_attempts(policy.max_retries)
            .base_delay(policy.base_delay)
            .backoff(Backoff::Exponential)
            .on_retry(move |_output, args| {
                log::debug!(
                    target: LOG_TARGET,
                    "retrying {name} (attempt {}, delay {}ms)",
                    args.attempt().index() + 1,
                    args.retry_delay().as_millis(),
                );
            }),
        Timeout::layer("timeout", &context)
            .timeout_error(|_| ApiError::Timeout)
            .timeout(policy.timeout),
        Execute::new(move |_input: ()| {
            let operation = operation.clone();
            async move { operation().await }
        }),
    )
        .into_service();

    service.execute(()).await
}
