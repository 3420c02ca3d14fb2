//! Domain types for root-volume growth.
//!
//! `Instance`, `Volume`, and `Modification` mirror what the storage backend
//! reports. `ResizePlan` and the step records are produced by the resize
//! components and threaded through a pipeline run by the driver.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a compute instance.
pub type InstanceId = String;

/// Identifier of a block storage volume.
pub type VolumeId = String;

/// Reason reported when the computed target does not exceed the current size.
pub const SKIP_AT_MAX_SIZE: &str = "already at max size";

/// Status marker reported once the expansion command has been submitted.
pub const STATUS_PARTITION_EXPANDED: &str = "partition_expanded";

// ── Instance ───────────────────────────────────────────────────────

/// A compute instance and its attached block devices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    /// Attached devices, in the order the backend reports them.
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

/// One attached device: kernel-visible name to backing volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    /// Absent for devices that are not backed by a block storage volume.
    pub volume_id: Option<VolumeId>,
}

impl Instance {
    /// Volume attached under `device_name`, if any.
    pub fn volume_for_device(&self, device_name: &str) -> Option<&str> {
        self.block_device_mappings
            .iter()
            .find(|m| m.device_name == device_name)
            .and_then(|m| m.volume_id.as_deref())
    }
}

// ── Volume ─────────────────────────────────────────────────────────

/// A block storage volume as last reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub id: VolumeId,
    /// Current size in GiB.
    pub size: u32,
    /// Modification history, most recent first. Empty for volumes that
    /// were never resized or whose record has expired.
    #[serde(default)]
    pub modifications: Vec<Modification>,
}

impl Volume {
    /// The most recent modification record, if the backend kept one.
    pub fn current_modification(&self) -> Option<&Modification> {
        self.modifications.first()
    }

    /// Lifecycle state of the most recent modification.
    ///
    /// A missing record, or one without a state, reads as `Completed`.
    pub fn modification_state(&self) -> ModificationState {
        ModificationState::from_record(self.current_modification())
    }
}

/// A backend-tracked, asynchronous change to a volume.
///
/// Fields are optional because the backend may report partial records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Modification {
    pub state: Option<String>,
    pub target_size: Option<u32>,
}

impl Modification {
    /// A modification in the given state targeting `target_size`.
    pub fn new(state: ModificationState, target_size: u32) -> Self {
        Self {
            state: Some(state.to_string()),
            target_size: Some(target_size),
        }
    }
}

/// Lifecycle state of a volume modification.
///
/// The backend owns these values; tags outside the known set are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModificationState {
    Modifying,
    Optimizing,
    Completed,
    Failed,
    Other(String),
}

impl ModificationState {
    /// Resolve the state of an optional modification record.
    pub fn from_record(record: Option<&Modification>) -> Self {
        record
            .and_then(|m| m.state.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::from)
            .unwrap_or(Self::Completed)
    }

    /// Whether the backend is still applying the modification.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Modifying | Self::Optimizing)
    }

    /// Whether the volume is safe to act on (no modification in flight
    /// and the last one did not fail).
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Modifying => "modifying",
            Self::Optimizing => "optimizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for ModificationState {
    fn from(s: &str) -> Self {
        match s {
            "modifying" => Self::Modifying,
            "optimizing" => Self::Optimizing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ModificationState {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ModificationState> for String {
    fn from(state: ModificationState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for ModificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Step records ───────────────────────────────────────────────────

/// A computed resize, read fresh from the backend and not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResizePlan {
    pub instance_id: InstanceId,
    pub volume_id: VolumeId,
    pub current_size: u32,
    pub new_size: u32,
}

impl ResizePlan {
    /// Whether the plan actually grows the volume.
    pub fn grows(&self) -> bool {
        self.new_size > self.current_size
    }
}

/// Outcome of one initiator invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InitiateOutcome {
    /// Target did not exceed the current size; nothing was written.
    Skipped { reason: String },
    /// A resize request was accepted by the backend.
    Initiated(ResizeRecord),
}

impl InitiateOutcome {
    pub fn skipped_at_max() -> Self {
        Self::Skipped {
            reason: SKIP_AT_MAX_SIZE.to_string(),
        }
    }

    /// The resize record, when a resize was initiated.
    pub fn resize(&self) -> Option<&ResizeRecord> {
        match self {
            Self::Initiated(record) => Some(record),
            Self::Skipped { .. } => None,
        }
    }
}

/// Record of an initiated resize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResizeRecord {
    pub instance_id: InstanceId,
    pub volume_id: VolumeId,
    pub current_size: u32,
    pub new_size: u32,
    /// When the modification request was issued (RFC 3339, UTC).
    pub modification_time: DateTime<Utc>,
}

/// Observed modification state for a volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateRecord {
    pub volume_id: VolumeId,
    pub state: ModificationState,
}

/// Record of a submitted filesystem expansion.
///
/// Submission only: the remote command may still be running or may fail
/// later on the instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpansionRecord {
    pub instance_id: InstanceId,
    pub status: String,
    pub command_id: String,
}

/// Accumulated context for one pipeline run.
///
/// Each step contributes its own named sub-record, so the context can be
/// persisted between steps and resumed without field collisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineContext {
    pub instance_id: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<InitiateOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<StateRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion: Option<ExpansionRecord>,
}

impl PipelineContext {
    pub fn new(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            ..Self::default()
        }
    }

    /// Volume under resize, once the initiator has issued one.
    pub fn volume_id(&self) -> Option<&str> {
        self.resize
            .as_ref()
            .and_then(InitiateOutcome::resize)
            .map(|r| r.volume_id.as_str())
    }

    /// Whether no further step remains for this run.
    pub fn is_finished(&self) -> bool {
        matches!(self.resize, Some(InitiateOutcome::Skipped { .. })) || self.expansion.is_some()
    }
}
