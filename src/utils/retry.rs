use tokio::time::{sleep, Duration};
use std::future::Future;

const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 8_000;

pub async fn retry_with_backoff<F, Fut, T, E>(max_attempts: u32, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    log::error!("Operation failed after {} attempts: {}", max_attempts, e);
                    return Err(e);
                }

                let delay_ms = backoff_delay_ms(attempt);
                log::warn!("Operation failed (attempt {}/{}): {}, retrying in {}ms",
                          attempt, max_attempts, e, delay_ms);
                sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

// 500ms, 1s, 2s, 4s, 8s, 8s, ...
fn backoff_delay_ms(attempt: u32) -> u64 {
    BASE_DELAY_MS
        .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_DELAY_MS)
}
