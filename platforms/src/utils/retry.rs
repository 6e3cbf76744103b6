use crate::utils::time::sleep_with_jitter;
use std::future::Future;
use tracing::warn;

/// Retries `operation` while it fails with a transient error, doubling the
/// delay after every attempt. Permanent errors are returned immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    mut retries: u32,
    base_delay_ms: u64,
    operation: F,
) -> common::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = common::Result<T>>,
{
    let mut delay = base_delay_ms;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if retries == 0 || !e.is_transient() {
                    return Err(e);
                }

                warn!(error = %e, retries_left = retries, delay_ms = delay, "transient failure, retrying");
                retries -= 1;
                sleep_with_jitter(delay, delay / 2).await;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result = retry_with_backoff(3, 1, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::RateLimit)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: common::Result<()> = retry_with_backoff(3, 1, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::Forbidden)
        })
        .await;

        assert!(matches!(result, Err(Error::Forbidden)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: common::Result<()> = retry_with_backoff(2, 1, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::GatewayTimeout)
        })
        .await;

        assert!(matches!(result, Err(Error::GatewayTimeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
