//! Deadlines for externally triggered work.
//!
//! Every entry point (crawl run, queue task, status poll) runs under a
//! deadline. The deadline is an explicit `Instant` handed down to the calls
//! that block, and expiry surfaces as [`FeedcastError::DeadlineExceeded`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::{FeedcastError, Result};

/// Deadline `secs` seconds from now.
pub fn after_secs(secs: u64) -> Instant {
    Instant::now() + Duration::from_secs(secs)
}

/// Run `fut` until `deadline`, mapping expiry to `DeadlineExceeded`.
pub async fn run_until<F, T>(deadline: Instant, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(FeedcastError::DeadlineExceeded(what.to_string())),
    }
}

/// The earlier of `deadline` and `timeout` from now.
pub fn earliest(deadline: Instant, timeout: Duration) -> Instant {
    deadline.min(Instant::now() + timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_until_completes() {
        let result = run_until(after_secs(5), "quick", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_expires() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let result: Result<()> = run_until(deadline, "slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_deadline_exceeded());
        assert!(err.to_string().contains("slow"));
    }

    #[tokio::test]
    async fn test_run_until_passes_inner_error() {
        let result: Result<()> = run_until(after_secs(5), "failing", async {
            Err(FeedcastError::Fetch("boom".to_string()))
        })
        .await;
        assert!(matches!(result, Err(FeedcastError::Fetch(_))));
    }

    #[test]
    fn test_earliest() {
        let far = Instant::now() + Duration::from_secs(100);
        let chosen = earliest(far, Duration::from_secs(1));
        assert!(chosen < far);

        let near = Instant::now() + Duration::from_millis(1);
        assert_eq!(earliest(near, Duration::from_secs(100)), near);
    }
}
