//! Request-scoped deadline and cancellation
//!
//! A [`RequestContext`] is passed to every adapter call. The manager also
//! derives shorter-lived children from it to bound cache calls.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a guarded call did not complete
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The request's cancellation token fired
    #[error("request cancelled")]
    Cancelled,

    /// The request's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline and cancellation supplied by the request-handling layer
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// A context with no deadline and a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    /// Replace the deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tie this context to an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Child context expiring at the earlier of this deadline and `now + limit`.
    ///
    /// Cancelling the parent cancels the child, never the reverse.
    pub fn limited(&self, limit: Duration) -> Self {
        let bound = Instant::now() + limit;
        let deadline = match self.deadline {
            Some(deadline) if deadline < bound => deadline,
            _ => bound,
        };
        Self {
            deadline: Some(deadline),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Fails fast when the context is already cancelled or expired.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancellation.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the deadline passes, or the token fires.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| Interrupted::DeadlineExceeded),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            res = bounded => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_without_deadline() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let res = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(res, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let ctx = RequestContext::new();
        let token = ctx.cancellation().clone();
        let handle = tokio::spawn(async move { ctx.run(std::future::pending::<()>()).await });
        token.cancel();
        assert_eq!(handle.await.unwrap(), Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limited_keeps_the_earlier_deadline() {
        let parent = RequestContext::with_timeout(Duration::from_millis(10));
        let child = parent.limited(Duration::from_secs(5));
        assert_eq!(child.deadline(), parent.deadline());

        let relaxed = RequestContext::new().limited(Duration::from_millis(20));
        assert!(relaxed.deadline().is_some());
    }

    #[test]
    fn test_cancelling_parent_cancels_child() {
        let parent = RequestContext::new();
        let child = parent.limited(Duration::from_secs(1));
        parent.cancellation().cancel();
        assert_eq!(child.check(), Err(Interrupted::Cancelled));
        assert_eq!(parent.check(), Err(Interrupted::Cancelled));
    }
}
