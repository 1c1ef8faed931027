//! Bounded concurrent execution over independent keys

use cloudsync_core::Result;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::future::Future;

/// Run `task` for every item with at most `limit` in flight.
///
/// The first error is returned and the tasks still running are dropped.
/// Results come back in completion order.
pub async fn try_for_each_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    stream::iter(items)
        .map(task)
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudsync_core::SyncError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_respects_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let out = try_for_each_bounded((0..20).collect(), 3, |i: u32| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i * 2)
            }
        })
        .await
        .unwrap();

        assert_eq!(out.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let mut sorted = out.clone();
        sorted.sort();
        assert_eq!(sorted[19], 38);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let out: Result<Vec<u32>> = try_for_each_bounded((0..10).collect(), 2, |i: u32| async move {
            if i == 4 {
                Err(SyncError::Upstream(format!("task {i} failed")))
            } else {
                Ok(i)
            }
        })
        .await;
        assert!(matches!(out, Err(SyncError::Upstream(_))));
    }
}
