//! Poll-until-terminal combinator.
//!
//! Calls a state check repeatedly, sleeping between pending observations,
//! and returns the first state outside the pending family. Errors from the
//! check abort immediately.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use volgrow_core::{StateRecord, VolgrowResult};

use crate::error::{DriverError, DriverResult};

/// Poll `check` until it reports a non-pending state.
///
/// `check` is called at most `max_attempts` times with `interval` between
/// calls. Exhausting the attempts yields [`DriverError::PollExhausted`]
/// carrying the last observed state.
pub async fn poll_until_terminal<F, Fut>(
    mut check: F,
    interval: Duration,
    max_attempts: u32,
) -> DriverResult<StateRecord>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VolgrowResult<StateRecord>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let record = check().await?;

        if !record.state.is_pending() {
            debug!(
                volume = %record.volume_id,
                state = %record.state,
                attempt,
                "modification reached terminal state"
            );
            return Ok(record);
        }

        if attempt >= max_attempts {
            return Err(DriverError::PollExhausted {
                volume_id: record.volume_id,
                state: record.state,
                attempts: attempt,
            });
        }

        debug!(
            volume = %record.volume_id,
            state = %record.state,
            attempt,
            max_attempts,
            "modification pending"
        );
        tokio::time::sleep(interval).await;
    }
}
