//! Blocking-call bridge with exponential backoff.
//!
//! Every attempt runs on tokio's blocking pool, so slow synchronous work (agent
//! subprocesses, demo seeding) never occupies a request worker. Failures are not
//! classified: whatever the operation returns as `Err`, or a panic inside it,
//! counts as one failed attempt. Only wrap operations that are safe to repeat.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure<E> {
    #[error(transparent)]
    Operation(E),
    #[error("blocking operation panicked: {0}")]
    Panicked(String),
}

/// The attempt budget ran out. `last` is the final failure, untouched.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    #[source]
    pub last: AttemptFailure<E>,
}

/// Attempt budget plus a doubling delay schedule (`base * 2^attempt_index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after the failed attempt with the given 0-based index.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }

    pub async fn run<T, E, F>(self, operation: F) -> Result<T, RetriesExhausted<E>>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        execute(operation, self.max_attempts, move |attempt_index| {
            self.delay_for(attempt_index)
        })
        .await
    }
}

/// Run `operation` off the async workers, retrying up to `max_attempts` times.
///
/// After the failed attempt `i` (0-based) the caller's task sleeps
/// `backoff(i)` before the next attempt. A budget of 0 is treated as 1.
pub async fn execute<T, E, F, B>(
    operation: F,
    max_attempts: u32,
    backoff: B,
) -> Result<T, RetriesExhausted<E>>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    B: Fn(u32) -> Duration + Send,
{
    let operation = Arc::new(operation);
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        let op = Arc::clone(&operation);
        let failure = match tokio::task::spawn_blocking(move || op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => AttemptFailure::Operation(err),
            Err(join_err) => AttemptFailure::Panicked(join_error_message(join_err)),
        };
        attempts += 1;

        if attempts >= max_attempts {
            return Err(RetriesExhausted {
                attempts,
                last: failure,
            });
        }

        let delay = backoff(attempts - 1);
        tracing::warn!(
            attempt = attempts,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "blocking operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "blocking task was cancelled".to_string();
    }
    panic_payload_message(err.into_panic())
}

fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
