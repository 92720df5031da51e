//! Bounded exponential backoff for `ExternalTransient` stage failures (spec §4.11, §7).

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{AmsError, Result};

/// Run `f` up to `cfg.max_attempts` times, doubling the backoff after each
/// transient failure. Non-retryable errors (per [`AmsError::is_retryable`])
/// return immediately without consuming further attempts.
pub async fn with_backoff<T, F, Fut>(cfg: &RetryConfig, stage: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < cfg.max_attempts.max(1) => {
                let backoff = cfg.base_backoff_ms.saturating_mul(1u64 << (attempt - 1));
                log::warn!(
                    "stage {stage} attempt {attempt}/{max} failed transiently, retrying in {backoff}ms: {e}",
                    max = cfg.max_attempts
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let cfg = RetryConfig { max_attempts: 3, base_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let result = with_backoff(&cfg, "asr", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AmsError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let cfg = RetryConfig { max_attempts: 3, base_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let result = with_backoff(&cfg, "asr", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AmsError::ExternalTransient { stage: "asr".into(), reason: "5xx".into() })
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let cfg = RetryConfig { max_attempts: 2, base_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_backoff(&cfg, "mfa", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AmsError::ExternalTransient { stage: "mfa".into(), reason: "timeout".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_returns_immediately() {
        let cfg = RetryConfig { max_attempts: 5, base_backoff_ms: 1 };
        let calls = AtomicU32::new(0);
        let result: Result<i32> = with_backoff(&cfg, "mfa", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AmsError::ExternalFatal { stage: "mfa".into(), reason: "bad exit".into() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
