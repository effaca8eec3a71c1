use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use claim_agent_model::{ErrorKind, ModelProviderError};
use tokio::time::{sleep, timeout};

/// Retry schedule for provider calls.
///
/// Delays grow exponentially from `initial_delay`, capped at `max_delay`,
/// and the number of attempts is the only bound. Each attempt is limited by
/// `call_timeout`, an attempt that times out counts as a transient failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
    /// Upper bound of a single attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// A provider call that failed, with the vendor error erased.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderFailure {
    kind: ErrorKind,
    message: String,
    attempts: u32,
}

impl ProviderFailure {
    /// Creates a failure of a single attempt.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 1,
        }
    }

    #[inline]
    pub(crate) fn from_provider<E: ModelProviderError>(err: &E) -> Self {
        Self::new(err.kind(), err.to_string())
    }

    /// Returns the kind of the last failure.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message of the last failure.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns how many attempts were made before giving up.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if self.attempts > 1 {
            write!(f, " (after {} attempts)", self.attempts)?;
        }
        Ok(())
    }
}

impl StdError for ProviderFailure {}

/// Runs `op` until it succeeds, fails permanently or runs out of attempts.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ProviderFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.backoff();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match timeout(policy.call_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderFailure::new(
                ErrorKind::Timeout,
                format!("{what} timed out after {:?}", policy.call_timeout),
            )),
        };
        let mut failure = match result {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        if !failure.kind.is_transient() || attempt >= max_attempts {
            error!("{what} failed after {attempt} attempt(s): {failure}");
            failure.attempts = attempt;
            return Err(failure);
        }

        let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
        warn!("{what} failed ({failure}), retrying in {delay:?}");
        sleep(delay).await;
    }
}
