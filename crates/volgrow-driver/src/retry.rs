//! Conflict retry with exponential backoff.
//!
//! Only errors that report themselves retryable (a conflicting in-flight
//! modification) are retried. Misconfiguration and backend rejections
//! abort on the first occurrence.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use volgrow_core::VolgrowResult;

use crate::error::{DriverError, DriverResult};

/// Doubling backoff, capped at a maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Delay to wait now; doubles the delay for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// Run `step`, retrying retryable failures up to `max_attempts` total
/// attempts.
pub async fn retry_on_conflict<T, F, Fut>(
    mut step: F,
    mut backoff: Backoff,
    max_attempts: u32,
) -> DriverResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VolgrowResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match step().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(DriverError::Step(e)),
            Err(e) if attempt >= max_attempts => {
                return Err(DriverError::RetriesExhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "conflicting modification, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use volgrow_core::{BackendError, ModificationState, VolgrowError};

    fn conflict() -> VolgrowError {
        VolgrowError::ConflictingModification {
            volume_id: "vol-1".to_string(),
            state: ModificationState::Optimizing,
        }
    }

    fn fast() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn backoff_initial_is_capped() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }

    #[test]
    fn backoff_saturates_near_duration_max() {
        let mut backoff = Backoff::new(Duration::MAX / 2 + Duration::from_secs(1), Duration::MAX);
        assert!(backoff.next_delay() > Duration::MAX / 2);
        assert_eq!(backoff.next_delay(), Duration::MAX);
        assert_eq!(backoff.next_delay(), Duration::MAX);
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let calls = Mutex::new(0u32);
        let value = retry_on_conflict(
            || {
                let n = {
                    let mut calls = calls.lock().unwrap();
                    *calls += 1;
                    *calls
                };
                async move { if n < 3 { Err(conflict()) } else { Ok(n) } }
            },
            fast(),
            5,
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Mutex::new(0u32);
        let err = retry_on_conflict(
            || {
                *calls.lock().unwrap() += 1;
                async { Err::<(), _>(conflict()) }
            },
            fast(),
            3,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DriverError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn retries_backend_reported_conflicts() {
        let calls = Mutex::new(0u32);
        let err = retry_on_conflict(
            || {
                *calls.lock().unwrap() += 1;
                async {
                    Err::<(), _>(VolgrowError::Backend(BackendError::Conflict {
                        volume_id: "vol-1".to_string(),
                        state: ModificationState::Modifying,
                    }))
                }
            },
            fast(),
            3,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DriverError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn non_retryable_aborts_immediately() {
        for error in [
            VolgrowError::MissingConfig("INSTANCE_ID"),
            VolgrowError::Backend(BackendError::Rejected("denied".to_string())),
        ] {
            let calls = Mutex::new(0u32);
            let error = Mutex::new(Some(error));
            let err = retry_on_conflict(
                || {
                    *calls.lock().unwrap() += 1;
                    let e = error.lock().unwrap().take();
                    async move {
                        match e {
                            Some(e) => Err::<(), _>(e),
                            None => Ok(()),
                        }
                    }
                },
                fast(),
                5,
            )
            .await
            .unwrap_err();

            assert!(matches!(err, DriverError::Step(_)));
            assert_eq!(*calls.lock().unwrap(), 1);
        }
    }
}
