//! In-memory backend.
//!
//! `MemoryCloud` implements both backend traits over shared maps. It is
//! `Clone` (backed by `Arc`) so a test can keep a handle while the
//! components own another. Every write is recorded for later inspection,
//! and failures can be injected per operation.
//!
//! With auto-progress enabled, each `describe_volume` call moves a pending
//! modification one step along `modifying → optimizing → completed`,
//! applying the target size on entering `optimizing`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{CommandAck, ModifyAck, RemoteExecApi, StorageApi};
use crate::error::{BackendError, BackendResult};
use crate::types::{Instance, Modification, ModificationState, Volume};

/// Backend operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeInstance,
    DescribeVolume,
    ModifyVolume,
    SubmitCommand,
}

/// A command accepted by [`MemoryCloud::submit_command`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedCommand {
    pub command_id: String,
    pub instance_id: String,
    pub document: String,
    pub commands: Vec<String>,
}

#[derive(Default)]
struct CloudState {
    instances: HashMap<String, Instance>,
    volumes: HashMap<String, Volume>,
    modify_requests: Vec<ModifyAck>,
    commands: Vec<SubmittedCommand>,
    failures: HashMap<Operation, BackendError>,
    describe_volume_calls: u32,
    auto_progress: bool,
}

/// In-memory storage and remote-execution backend.
#[derive(Clone, Default)]
pub struct MemoryCloud {
    state: Arc<RwLock<CloudState>>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable automatic lifecycle progression.
    pub async fn set_auto_progress(&self, enabled: bool) {
        self.state.write().await.auto_progress = enabled;
    }

    pub async fn put_instance(&self, instance: Instance) {
        self.state
            .write()
            .await
            .instances
            .insert(instance.id.clone(), instance);
    }

    pub async fn put_volume(&self, volume: Volume) {
        self.state
            .write()
            .await
            .volumes
            .insert(volume.id.clone(), volume);
    }

    /// Current snapshot of a volume, without lifecycle progression.
    pub async fn volume(&self, volume_id: &str) -> Option<Volume> {
        self.state.read().await.volumes.get(volume_id).cloned()
    }

    /// Overwrite the state of a volume's most recent modification,
    /// creating a record if none exists.
    pub async fn set_modification_state(&self, volume_id: &str, state: ModificationState) {
        let mut guard = self.state.write().await;
        if let Some(volume) = guard.volumes.get_mut(volume_id) {
            match volume.modifications.first_mut() {
                Some(m) => m.state = Some(state.to_string()),
                None => volume
                    .modifications
                    .push(Modification::new(state, volume.size)),
            }
        }
    }

    /// Make every call of `op` fail with `error` until cleared.
    pub async fn fail(&self, op: Operation, error: BackendError) {
        self.state.write().await.failures.insert(op, error);
    }

    pub async fn clear_failure(&self, op: Operation) {
        self.state.write().await.failures.remove(&op);
    }

    /// Modification requests accepted so far, in order.
    pub async fn modify_requests(&self) -> Vec<ModifyAck> {
        self.state.read().await.modify_requests.clone()
    }

    /// Commands accepted so far, in order.
    pub async fn submitted_commands(&self) -> Vec<SubmittedCommand> {
        self.state.read().await.commands.clone()
    }

    pub async fn describe_volume_calls(&self) -> u32 {
        self.state.read().await.describe_volume_calls
    }
}

impl CloudState {
    fn check(&self, op: Operation) -> BackendResult<()> {
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Move the most recent modification one lifecycle step forward.
fn advance(volume: &mut Volume) {
    let Some(modification) = volume.modifications.first_mut() else {
        return;
    };
    let next = match ModificationState::from_record(Some(&*modification)) {
        ModificationState::Modifying => {
            if let Some(target) = modification.target_size {
                volume.size = volume.size.max(target);
            }
            ModificationState::Optimizing
        }
        ModificationState::Optimizing => ModificationState::Completed,
        _ => return,
    };
    debug!(volume = %volume.id, state = %next, "modification advanced");
    modification.state = Some(next.to_string());
}

#[async_trait]
impl StorageApi for MemoryCloud {
    async fn describe_instance(&self, instance_id: &str) -> BackendResult<Instance> {
        let guard = self.state.read().await;
        guard.check(Operation::DescribeInstance)?;
        guard
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("instance {instance_id}")))
    }

    async fn describe_volume(&self, volume_id: &str) -> BackendResult<Volume> {
        let mut guard = self.state.write().await;
        guard.describe_volume_calls += 1;
        guard.check(Operation::DescribeVolume)?;

        let auto_progress = guard.auto_progress;
        let volume = guard
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| BackendError::NotFound(format!("volume {volume_id}")))?;

        let snapshot = volume.clone();
        if auto_progress {
            advance(volume);
        }
        Ok(snapshot)
    }

    async fn modify_volume_size(&self, volume_id: &str, new_size: u32) -> BackendResult<ModifyAck> {
        let mut guard = self.state.write().await;
        guard.check(Operation::ModifyVolume)?;

        let volume = guard
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| BackendError::NotFound(format!("volume {volume_id}")))?;

        let state = volume.modification_state();
        if state.is_pending() {
            return Err(BackendError::Conflict {
                volume_id: volume_id.to_string(),
                state,
            });
        }
        if new_size <= volume.size {
            return Err(BackendError::Rejected(format!(
                "new size {new_size} must exceed current size {}",
                volume.size
            )));
        }

        volume
            .modifications
            .insert(0, Modification::new(ModificationState::Modifying, new_size));

        let ack = ModifyAck {
            volume_id: volume_id.to_string(),
            target_size: new_size,
        };
        guard.modify_requests.push(ack.clone());
        Ok(ack)
    }
}

#[async_trait]
impl RemoteExecApi for MemoryCloud {
    async fn submit_command(
        &self,
        instance_id: &str,
        document: &str,
        commands: &[String],
    ) -> BackendResult<CommandAck> {
        let mut guard = self.state.write().await;
        guard.check(Operation::SubmitCommand)?;

        if !guard.instances.contains_key(instance_id) {
            return Err(BackendError::NotFound(format!("instance {instance_id}")));
        }

        let command_id = format!("cmd-{:04}", guard.commands.len() + 1);
        guard.commands.push(SubmittedCommand {
            command_id: command_id.clone(),
            instance_id: instance_id.to_string(),
            document: document.to_string(),
            commands: commands.to_vec(),
        });
        Ok(CommandAck { command_id })
    }
}
