use std::future::Future;

/// Run an operation against a session-based service, recovering once on failure.
///
/// - `identifier`: names the unit of work in logs
/// - `on_failure`: recovery action run before the retry (usually a session reset)
/// - `operation`: the async closure to run
///
/// The recovery action runs at most once and the operation at most twice.
/// If the retry also fails, its error is returned.
pub async fn retry_once<F, Fut, T, E, R>(identifier: &str, on_failure: R, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnOnce(),
    E: std::fmt::Display,
{
    match operation().await {
        Ok(val) => Ok(val),
        Err(e) => {
            tracing::warn!("{} failed, resetting and retrying once: {}", identifier, e);
            on_failure();
            let result = operation().await;
            if let Err(e) = &result {
                tracing::warn!("{} failed after retry: {}", identifier, e);
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_first_try_without_recovery() {
        let resets = AtomicU32::new(0);
        let result: Result<i32, String> = retry_once(
            "first try",
            || {
                resets.fetch_add(1, Ordering::SeqCst);
            },
            || async { Ok(42) },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fails_once_then_succeeds() {
        let resets = AtomicU32::new(0);
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result: Result<i32, String> = retry_once(
            "flaky",
            || {
                resets.fetch_add(1, Ordering::SeqCst);
            },
            || {
                let cc = cc.clone();
                async move {
                    if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("stale token".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fails_twice_propagates_and_recovers_once() {
        let resets = AtomicU32::new(0);
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();
        let result: Result<i32, String> = retry_once(
            "broken",
            || {
                resets.fetch_add(1, Ordering::SeqCst);
            },
            || {
                let cc = cc.clone();
                async move {
                    let n = cc.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {}", n))
                }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), "failure 1");
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
