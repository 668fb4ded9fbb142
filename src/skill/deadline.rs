//! Deadline race around a single completion call.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::completion::{Completer, Error};

/// How a guarded call settled.
#[derive(Debug)]
pub enum CallOutcome {
    /// The call won the race. Text is lower-cased.
    Completed(String),
    /// The call settled first but with an error.
    Failed(Error),
    /// The deadline fired first; any late result is discarded.
    TimedOut,
}

impl CallOutcome {
    /// Collapse to the text result, treating failure and timeout alike.
    pub fn text(self) -> Option<String> {
        match self {
            CallOutcome::Completed(text) => Some(text),
            CallOutcome::Failed(_) | CallOutcome::TimedOut => None,
        }
    }
}

/// Timer task that cancels its token once the deadline passes.
///
/// Dropping the timer cancels the token too, which ends the task early.
struct Deadline {
    token: CancellationToken,
}

impl Deadline {
    fn start(after: Duration) -> Self {
        let token = CancellationToken::new();
        let timer_token = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = timer_token.cancelled() => {
                    // Released by the winning call
                }
                _ = sleep(after) => {
                    timer_token.cancel();
                }
            }
        });

        Self { token }
    }

    async fn expired(&self) {
        self.token.cancelled().await
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Race `completer` against `deadline`. Exactly one outcome is observed.
pub async fn call_with_deadline<C>(completer: &C, prompt: &str, deadline: Duration) -> CallOutcome
where
    C: Completer + ?Sized,
{
    let started = Instant::now();
    let timer = Deadline::start(deadline);

    let outcome = tokio::select! {
        result = completer.complete(prompt) => match result {
            Ok(text) => CallOutcome::Completed(text.to_lowercase()),
            Err(e) => CallOutcome::Failed(e),
        },
        _ = timer.expired() => CallOutcome::TimedOut,
    };
    drop(timer);

    let elapsed_ms = started.elapsed().as_millis();
    match &outcome {
        CallOutcome::Completed(text) => {
            info!("🧠 Completion in {elapsed_ms}ms ({} chars)", text.len())
        }
        CallOutcome::Failed(e) => warn!("Completion failed after {elapsed_ms}ms: {e}"),
        CallOutcome::TimedOut => warn!("Completion timed out after {elapsed_ms}ms"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Answers with `text` after `delay`, flagging when it finishes.
    struct SlowCompleter {
        delay: Duration,
        text: &'static str,
        finished: Arc<AtomicBool>,
    }

    impl SlowCompleter {
        fn new(delay: Duration, text: &'static str) -> Self {
            Self {
                delay,
                text,
                finished: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl Completer for SlowCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, Error> {
            sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl Completer for FailingCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, Error> {
            Err(Error::Http("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_fast_call_wins() {
        let completer = SlowCompleter::new(Duration::from_millis(10), "And Flew Away.");
        let outcome = call_with_deadline(&completer, "x", Duration::from_millis(500)).await;
        match outcome {
            CallOutcome::Completed(text) => assert_eq!(text, "and flew away."),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let completer = SlowCompleter::new(Duration::from_millis(300), "too late");
        let outcome = call_with_deadline(&completer, "x", Duration::from_millis(30)).await;
        assert!(matches!(outcome, CallOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_late_result_is_discarded() {
        let completer = SlowCompleter::new(Duration::from_millis(100), "too late");
        let finished = completer.finished.clone();
        let outcome = call_with_deadline(&completer, "x", Duration::from_millis(20)).await;
        assert!(outcome.text().is_none());

        // The losing call was dropped, so it never runs to completion
        sleep(Duration::from_millis(200)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_error_is_failure_not_panic() {
        let outcome = call_with_deadline(&FailingCompleter, "x", Duration::from_millis(500)).await;
        assert!(matches!(outcome, CallOutcome::Failed(Error::Http(_))));
        assert!(outcome.text().is_none());
    }

    #[tokio::test]
    async fn test_dropping_deadline_cancels_timer() {
        let timer = Deadline::start(Duration::from_secs(60));
        let token = timer.token.clone();
        assert!(!token.is_cancelled());
        drop(timer);
        assert!(token.is_cancelled());
    }
}
