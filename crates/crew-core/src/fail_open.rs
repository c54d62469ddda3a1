//! Best-effort steps that must never abort an iteration.
//!
//! Activity logging and git persistence go through [`fail_open`]. Agent
//! invocations and config loading do not: their errors propagate.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Awaits `f`, turning an error into a warning and `None`.
///
/// ```no_run
/// use crew_core::fail_open::fail_open;
/// use crew_core::Result;
///
/// async fn commit() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     if fail_open("persistence", || commit()).await.is_none() {
///         // nothing was committed, the iteration still succeeds
///     }
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    f().await
        .map_err(|e| warn!(operation, error = %e, "best-effort step failed, continuing"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrewError;

    #[tokio::test]
    async fn success_passes_value_through() {
        let value = fail_open("log", || async { Ok::<_, CrewError>("written") }).await;
        assert_eq!(value, Some("written"));
    }

    #[tokio::test]
    async fn persistence_error_becomes_none() {
        let value = fail_open("persistence", || async {
            Err::<(), _>(CrewError::Persistence("git commit failed: nothing to commit".into()))
        })
        .await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn closure_runs_exactly_once() {
        let mut calls = 0;
        let _ = fail_open("log", || {
            calls += 1;
            async { Err::<(), _>(CrewError::Other("disk full".into())) }
        })
        .await;
        assert_eq!(calls, 1);
    }
}
