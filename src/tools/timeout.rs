//! Execution Timeout Management
//!
//! Races a running command against its wall-clock budget and an optional
//! cancellation token.

use std::future::Future;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// How a raced future ended
#[derive(Debug, PartialEq, Eq)]
pub enum Deadline<T> {
    /// The future finished within the budget
    Completed(T),

    /// The budget elapsed first
    TimedOut,

    /// The cancellation token fired first
    Cancelled,
}

/// Execution timeout configuration
///
/// The losing future is dropped; terminating whatever it was waiting on is
/// left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// ```
    /// use std::time::Duration;
    /// use smartcode::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drive `future` until it completes, the timeout elapses, or `cancel` fires
    pub async fn race<F>(&self, future: F, cancel: Option<&CancellationToken>) -> Deadline<F::Output>
    where
        F: Future,
    {
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = future => Deadline::Completed(output),
            _ = time::sleep(self.duration) => Deadline::TimedOut,
            _ = cancelled => Deadline::Cancelled,
        }
    }
}
