use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
///
/// Returns the last error once every attempt failed.
pub async fn retry_bounded<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("All {} attempts failed: {}", attempts, e);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_bounded(5, Duration::ZERO, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("fail {}", attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_bounded(5, Duration::ZERO, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("fail {}", attempt)) }
        })
        .await;

        assert_eq!(result, Err("fail 5".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
