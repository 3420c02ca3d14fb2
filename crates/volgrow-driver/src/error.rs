//! Driver error types.

use thiserror::Error;

use volgrow_core::{ModificationState, VolgrowError};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Step(#[from] VolgrowError),

    #[error("volume {volume_id} still {state} after {attempts} polls")]
    PollExhausted {
        volume_id: String,
        state: ModificationState,
        attempts: u32,
    },

    #[error("modification of volume {volume_id} ended in state {state}")]
    ModificationFailed {
        volume_id: String,
        state: ModificationState,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: VolgrowError,
    },

    #[error("pipeline context for {instance_id} has no resized volume")]
    MissingVolume { instance_id: String },
}

pub type DriverResult<T> = Result<T, DriverError>;
