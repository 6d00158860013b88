use std::future::Future;
use std::time::Duration;

/// Capped exponential backoff with optional random jitter.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    pub attempts: u32,
    pub initial: Duration,
    pub ceiling: Duration,
    pub jitter: Duration,
}

impl Backoff {
    /// Transaction retries: 3 attempts starting at 20ms.
    pub const TRANSACTION: Backoff = Backoff {
        attempts: 3,
        initial: Duration::from_millis(20),
        ceiling: Duration::from_millis(500),
        jitter: Duration::from_millis(50),
    };

    /// Wait before retry number `retry` (0-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        self.initial
            .checked_mul(2u32.saturating_pow(retry))
            .map_or(self.ceiling, |d| d.min(self.ceiling))
    }

    /// Wait before retry number `retry` (1-based), or `None` once the
    /// `attempts` budget is spent.
    pub fn next_delay(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry >= self.attempts {
            return None;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::random_range(0..=jitter_ms))
        };
        Some(self.base_delay(retry - 1) + extra)
    }
}

/// Re-runs `op` while it fails with an error `is_transient` accepts, up to
/// `backoff.attempts` calls in total. Other errors return immediately.
pub async fn retry_when<Op, Fut, T, E>(
    backoff: Backoff,
    is_transient: impl Fn(&E) -> bool,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retry = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        retry += 1;
        let Some(wait) = backoff.next_delay(retry).filter(|_| is_transient(&err)) else {
            return Err(err);
        };
        tracing::debug!("Transient failure, retry {} in {:?}", retry, wait);
        tokio::time::sleep(wait).await;
    }
}
