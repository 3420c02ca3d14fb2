//! Backend interfaces consumed by the resize components.
//!
//! Only the operations the components need are modeled; request and
//! response wire shapes belong to the provider implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;
use crate::types::{Instance, Volume};

/// Acknowledgement of an accepted volume modification request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModifyAck {
    pub volume_id: String,
    pub target_size: u32,
}

/// Acknowledgement of a submitted remote command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandAck {
    /// Backend-assigned id for tracking the command.
    pub command_id: String,
}

/// Storage control plane.
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn describe_instance(&self, instance_id: &str) -> BackendResult<Instance>;

    async fn describe_volume(&self, volume_id: &str) -> BackendResult<Volume>;

    /// Ask the backend to grow `volume_id` to `new_size` GiB. Completion is
    /// asynchronous and observed through `describe_volume`.
    async fn modify_volume_size(&self, volume_id: &str, new_size: u32) -> BackendResult<ModifyAck>;
}

/// Remote command execution on instances.
#[async_trait]
pub trait RemoteExecApi: Send + Sync {
    /// Submit `commands` to run on `instance_id` through `document`.
    /// Returns once the backend accepts the submission.
    async fn submit_command(
        &self,
        instance_id: &str,
        document: &str,
        commands: &[String],
    ) -> BackendResult<CommandAck>;
}
