use super::errors::{CatalogError, CatalogResult};
use std::future::Future;
use std::time::Duration;

/// Политика повторов с экспоненциальной задержкой
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Общее число попыток (включая первую)
    pub max_attempts: u32,
    /// Базовая задержка, удваивается на каждой попытке
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Sentos: 500/429, 3 попытки, 5s × 2^n
    pub fn sentos() -> Self {
        Self::new(3, Duration::from_secs(5))
    }

    /// Shopify GraphQL THROTTLED: 5 попыток, 1s × 2^n
    pub fn shopify_throttle() -> Self {
        Self::new(5, Duration::from_secs(1))
    }

    /// Задержка перед повтором после неудачной попытки `attempt` (с нуля)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Выполнить операцию, повторяя ее, пока `should_retry` разрешает.
    /// После последней попытки возвращается последняя ошибка.
    pub async fn execute<F, Fut, T, R>(
        &self,
        operation_name: &str,
        should_retry: R,
        mut f: F,
    ) -> CatalogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
        R: Fn(&CatalogError) -> bool,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let last_attempt = attempt + 1 >= self.max_attempts;
                    if last_attempt || !should_retry(&error) {
                        if last_attempt && should_retry(&error) {
                            tracing::warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %error,
                                "Max retries exceeded"
                            );
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
