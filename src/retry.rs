use anyhow::Result;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

/// Base delay between attempts; the nth retry waits n times this.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Ephemeral bookkeeping for one in-flight call. Discarded when the call
/// resolves or the caller gives up.
struct RetryState {
    attempt: u32,
    max_retries: u32,
}

impl RetryState {
    fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries,
        }
    }

    fn exhausted(&self) -> bool {
        self.attempt >= self.max_retries
    }

    fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        BACKOFF_BASE * self.attempt
    }
}

/// Runs `operation`, retrying with linear backoff while `is_retryable`
/// classifies the failure as transient and the retry budget lasts.
///
/// The operation is invoked at most `max_retries + 1` times. Once the budget
/// is spent — or the moment a failure is classified non-retryable — the
/// original error is returned unchanged, never wrapped. Deterministic
/// failures (validation, authorization, server-side rejection) must classify
/// as non-retryable so they surface immediately instead of burning round
/// trips.
///
/// This is the fine-grained, same-call retry for a single foreground action.
/// A queued write that fails takes the coarse path instead: it stays in the
/// mutation queue for the next sync cycle.
pub async fn with_retry<T, F, Fut, C>(
    mut operation: F,
    max_retries: u32,
    is_retryable: C,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&anyhow::Error) -> bool,
{
    let mut state = RetryState::new(max_retries);
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && !state.exhausted() => {
                let delay = state.next_delay();
                log::warn!(
                    "transient failure, retrying in {delay:?} (attempt {} of {}): {err:#}",
                    state.attempt + 1,
                    state.max_retries + 1,
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Default classifier: true when the error chain contains an I/O error of a
/// connectivity kind.
///
/// Callers whose transport surfaces richer error types (HTTP clients and the
/// like) should pass their own classifier to [`with_retry`]; this one only
/// recognizes `std::io::Error`.
pub fn is_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io_err| {
                matches!(
                    io_err.kind(),
                    ErrorKind::TimedOut
                        | ErrorKind::ConnectionRefused
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::NotConnected
                        | ErrorKind::BrokenPipe
                        | ErrorKind::UnexpectedEof
                        | ErrorKind::Interrupted
                )
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn timeout_error() -> anyhow::Error {
        anyhow::Error::from(std::io::Error::new(ErrorKind::TimedOut, "request timed out"))
    }

    #[test]
    fn transport_classifier_accepts_io_connectivity_kinds() {
        assert!(is_transport_error(&timeout_error()));
        assert!(is_transport_error(&anyhow::Error::from(
            std::io::Error::new(ErrorKind::ConnectionReset, "reset by peer")
        )));
    }

    #[test]
    fn transport_classifier_sees_through_context() {
        let err = timeout_error().context("uploading passport scan");
        assert!(is_transport_error(&err));
    }

    #[test]
    fn transport_classifier_rejects_deterministic_errors() {
        assert!(!is_transport_error(&anyhow!("missing field: visa_number")));
        assert!(!is_transport_error(&anyhow::Error::from(
            std::io::Error::new(ErrorKind::PermissionDenied, "forbidden")
        )));
    }
}
