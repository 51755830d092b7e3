//! Cancellation and deadlines for long-running operations.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why an operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Coordinator that cancels every token it handed out.
///
/// Backed by a watch channel so late subscribers still see the signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
            deadline: None,
        }
    }

    /// Cancel all tokens.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheap, cloneable view of a cancellation signal plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Deadline `timeout` from now. Zero leaves the token unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            self
        } else {
            self.with_deadline(Instant::now() + timeout)
        }
    }

    /// Fail fast if already cancelled or past the deadline.
    pub fn check(&self) -> Result<(), CancelReason> {
        if self.rx.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(CancelReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(CancelReason::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn cancelled(&self) -> CancelReason {
        let signal = async {
            match self.rx.clone() {
                Some(mut rx) => {
                    let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
                    if fired {
                        return CancelReason::Cancelled;
                    }
                    // Source dropped without cancelling.
                    std::future::pending::<CancelReason>().await
                }
                None => std::future::pending::<CancelReason>().await,
            }
        };
        let expiry = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    CancelReason::DeadlineExceeded
                }
                None => std::future::pending::<CancelReason>().await,
            }
        };

        tokio::select! {
            reason = signal => reason,
            reason = expiry => reason,
        }
    }
}
