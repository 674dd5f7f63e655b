use std::future::Future;
use std::time::Duration;

use hulul_core::error::{HululError, Result};

/// Runs a remote call with an upper bound on how long it may take.
///
/// An elapsed bound becomes `HululError::Timeout`, which callers treat like
/// any other transient gateway failure.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(HululError::timeout(format!(
            "{} did not answer within {}s",
            operation,
            limit.as_secs_f32()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_call_is_a_timeout() {
        let err = bounded(Duration::from_secs(2), "fetch", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HululError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let value = bounded(Duration::from_secs(1), "fetch", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
