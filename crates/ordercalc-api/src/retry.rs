use ordercalc_core::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry behavior for transport failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, first try included
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub base_delay: Duration,

    /// Factor applied to the delay after each attempt
    pub backoff_factor: f64,

    /// Relative jitter applied to every delay, e.g. 0.2 for ±20%
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            jitter: 0.2,
        }
    }
}

/// Run `operation`, retrying transport-class failures with exponential backoff
///
/// All other error kinds short-circuit on the first attempt.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.base_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!("request succeeded after {} attempts", attempts);
                }
                return Ok(value);
            }
            Err(error) => {
                if attempts >= config.max_attempts || !error.is_transport() {
                    return Err(error);
                }

                warn!(
                    "attempt {} failed: {}. retrying in {:?}",
                    attempts, error, delay
                );

                sleep(jittered(delay, config.jitter)).await;
                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_factor);
            }
        }
    }
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
