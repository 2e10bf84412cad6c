// libs/appointment-cell/src/services/consistency.rs
//
// Timeout and retry policy for store round-trips. A timed-out write may
// still have committed, so writes that are not safe to repeat go through
// `retrying_write`, which looks for the earlier commit before trying again.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::AppointmentError;
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct StoreGuard {
    timeout: Duration,
    max_retry_attempts: u32,
}

impl StoreGuard {
    pub fn new(timeout: Duration, max_retry_attempts: u32) -> Self {
        Self {
            timeout,
            max_retry_attempts: max_retry_attempts.max(1),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.request_timeout(), config.booking_max_retries)
    }

    /// Run one store call under the request timeout.
    pub async fn once<T, F>(&self, operation: &str, fut: F) -> Result<T, AppointmentError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(AppointmentError::from),
            Err(_) => {
                warn!("{} timed out after {:?}", operation, self.timeout);
                Err(AppointmentError::Transient(format!("{} timed out", operation)))
            }
        }
    }

    /// Run an atomic store call, retrying transient failures with linear backoff.
    pub async fn retrying<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, AppointmentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match self.once(operation, attempt_fn()).await {
                Err(e) if e.is_retryable() && attempt < self.max_retry_attempts => {
                    warn!(
                        "{} failed transiently ({}), retrying attempt {}/{}",
                        operation,
                        e,
                        attempt + 1,
                        self.max_retry_attempts
                    );
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Like `retrying`, for writes that must not be applied twice. Before each
    /// retry `committed` is asked whether the failed attempt landed anyway;
    /// `Some` is taken as the write's result.
    pub async fn retrying_write<T, W, WFut, C, CFut>(
        &self,
        operation: &str,
        mut write: W,
        mut committed: C,
    ) -> Result<T, AppointmentError>
    where
        W: FnMut() -> WFut,
        WFut: Future<Output = Result<T, StoreError>>,
        C: FnMut() -> CFut,
        CFut: Future<Output = Result<Option<T>, StoreError>>,
    {
        let mut attempt = 1;
        let mut result = self.once(operation, write()).await;
        loop {
            match result {
                Err(e) if e.is_retryable() && attempt < self.max_retry_attempts => {
                    warn!(
                        "{} failed transiently ({}), checking before attempt {}/{}",
                        operation,
                        e,
                        attempt + 1,
                        self.max_retry_attempts
                    );
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    attempt += 1;
                    result = match self.once(operation, committed()).await {
                        Ok(Some(value)) => {
                            info!("{} had already committed; not repeating it", operation);
                            return Ok(value);
                        }
                        Ok(None) => self.once(operation, write()).await,
                        Err(e) => Err(e),
                    };
                }
                other => return other,
            }
        }
    }
}
