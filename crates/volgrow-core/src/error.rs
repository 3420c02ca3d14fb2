//! Error types for volume growth.

use thiserror::Error;

use crate::types::ModificationState;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type alias for component entry points.
pub type VolgrowResult<T> = Result<T, VolgrowError>;

/// Errors reported by the storage or remote-execution backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    /// The volume already has a modification in flight.
    #[error("IncorrectModificationState: Volume {volume_id} is {state}")]
    Conflict {
        volume_id: String,
        state: ModificationState,
    },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// How the driver should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid settings. Never retried.
    Misconfiguration,
    /// Another modification is in flight. Retry after a delay.
    Conflict,
    /// A backend call failed. Not retried by the components.
    Backend,
}

/// Errors surfaced by the resize components.
#[derive(Debug, Error)]
pub enum VolgrowError {
    #[error("{0} not set")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("instance {instance_id} has no volume attached at {device_name}")]
    RootDeviceNotFound {
        instance_id: String,
        device_name: String,
    },

    #[error("IncorrectModificationState: Volume {volume_id} is {state}")]
    ConflictingModification {
        volume_id: String,
        state: ModificationState,
    },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl VolgrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfig(_) | Self::InvalidConfig(_) | Self::RootDeviceNotFound { .. } => {
                ErrorKind::Misconfiguration
            }
            Self::ConflictingModification { .. }
            | Self::Backend(BackendError::Conflict { .. }) => ErrorKind::Conflict,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Only conflicting-operation errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}
