//! Compensating transaction runner.
//!
//! Deployment rollback (freeing reserved resources, removing half-created
//! containers) must not be skipped because the caller went away, so the
//! orchestrator drives every multi-step mutation through [`txn`] from a
//! spawned task: dropping the result stream only makes sends fail, it never
//! cancels a rollback in flight.

use crate::error::{GantryError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run a try/then/rollback sequence.
///
/// `try_phase` and, on its success, `then_phase` each run bounded by
/// `timeout`. When either fails, `rollback` runs bounded by a fresh
/// `timeout` of its own, so cleanup gets a full deadline no matter how much
/// of the budget the failing phase burned. The first error encountered is
/// returned; a rollback failure is logged, never surfaced.
///
/// Sites without compensation pass [`nothing`].
pub async fn txn<TryF, TryFut, ThenF, ThenFut, RollF, RollFut>(
    try_phase: TryF,
    then_phase: ThenF,
    rollback: RollF,
    timeout: Duration,
) -> Result<()>
where
    TryF: FnOnce() -> TryFut,
    TryFut: Future<Output = Result<()>> + Send,
    ThenF: FnOnce() -> ThenFut,
    ThenFut: Future<Output = Result<()>> + Send,
    RollF: FnOnce() -> RollFut,
    RollFut: Future<Output = Result<()>> + Send,
{
    let first_err = match bounded(timeout, try_phase()).await {
        Ok(()) => match bounded(timeout, then_phase()).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        },
        Err(e) => e,
    };

    if let Err(e) = bounded(timeout, rollback()).await {
        warn!(error = %e, "rollback failed");
    }
    Err(first_err)
}

/// No-op phase for txn sites without a then or rollback step.
pub async fn nothing() -> Result<()> {
    Ok(())
}

async fn bounded<F>(timeout: Duration, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(GantryError::DeadlineExceeded { timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const T: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_then_runs_after_try_succeeds() {
        let then_runs = Arc::new(AtomicUsize::new(0));
        let rollback_runs = Arc::new(AtomicUsize::new(0));
        let (t, r) = (then_runs.clone(), rollback_runs.clone());

        let result = txn(
            nothing,
            move || async move {
                t.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move || async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            T,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(then_runs.load(Ordering::SeqCst), 1);
        assert_eq!(rollback_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rollback_runs_on_try_failure() {
        let then_runs = Arc::new(AtomicUsize::new(0));
        let rollback_runs = Arc::new(AtomicUsize::new(0));
        let (t, r) = (then_runs.clone(), rollback_runs.clone());

        let result = txn(
            || async { Err(GantryError::Internal("boom".to_string())) },
            move || async move {
                t.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move || async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            T,
        )
        .await;

        assert_eq!(result, Err(GantryError::Internal("boom".to_string())));
        assert_eq!(then_runs.load(Ordering::SeqCst), 0);
        assert_eq!(rollback_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rollback_runs_on_then_failure() {
        let rollback_runs = Arc::new(AtomicUsize::new(0));
        let r = rollback_runs.clone();

        let result = txn(
            nothing,
            || async { Err(GantryError::Internal("later".to_string())) },
            move || async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            T,
        )
        .await;

        assert_eq!(result, Err(GantryError::Internal("later".to_string())));
        assert_eq!(rollback_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_error_wins_over_rollback_error() {
        let result = txn(
            || async { Err(GantryError::Internal("first".to_string())) },
            nothing,
            || async { Err(GantryError::Internal("rollback".to_string())) },
            T,
        )
        .await;

        assert_eq!(result, Err(GantryError::Internal("first".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_timeout_triggers_rollback() {
        let rollback_runs = Arc::new(AtomicUsize::new(0));
        let r = rollback_runs.clone();

        let result = txn(
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
            nothing,
            move || async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            T,
        )
        .await;

        assert_eq!(result, Err(GantryError::DeadlineExceeded { timeout: T }));
        assert_eq!(rollback_runs.load(Ordering::SeqCst), 1);
    }
}
