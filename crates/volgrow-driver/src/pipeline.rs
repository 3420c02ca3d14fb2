//! The resize pipeline.
//!
//! Drives initiate → poll → expand for one instance, recording each step's
//! result in a [`PipelineContext`]. A context persisted after any step can
//! be handed back to [`Pipeline::resume`], which picks up at the first step
//! without a record.

use tracing::{info, warn};

use volgrow_core::{InitiateOutcome, PipelineContext, RemoteExecApi, StorageApi, VolgrowConfig};
use volgrow_resize::{check_state, expand_filesystem, initiate};

use crate::error::{DriverError, DriverResult};
use crate::poll::poll_until_terminal;
use crate::retry::{Backoff, retry_on_conflict};

/// Runs the resize steps against a storage and a remote-execution backend.
pub struct Pipeline<S, R> {
    storage: S,
    remote: R,
    config: VolgrowConfig,
}

impl<S, R> Pipeline<S, R>
where
    S: StorageApi,
    R: RemoteExecApi,
{
    pub fn new(storage: S, remote: R, config: VolgrowConfig) -> Self {
        Self {
            storage,
            remote,
            config,
        }
    }

    pub fn config(&self) -> &VolgrowConfig {
        &self.config
    }

    /// Run every step for the configured instance.
    pub async fn run(&self) -> DriverResult<PipelineContext> {
        let instance_id = self.config.growth.require_instance_id()?;
        self.resume(PipelineContext::new(instance_id)).await
    }

    /// Continue a run from the first step that has no record in `ctx`.
    pub async fn resume(&self, mut ctx: PipelineContext) -> DriverResult<PipelineContext> {
        self.config.validate()?;

        if ctx.resize.is_none() {
            let retry = &self.config.retry;
            let backoff = Backoff::new(retry.initial_backoff()?, retry.max_backoff()?);
            let outcome = retry_on_conflict(
                || initiate(&self.storage, &self.config.growth),
                backoff,
                retry.max_attempts,
            )
            .await?;
            ctx.resize = Some(outcome);
        }

        if let Some(InitiateOutcome::Skipped { reason }) = &ctx.resize {
            info!(instance = %ctx.instance_id, %reason, "pipeline finished without resize");
            return Ok(ctx);
        }

        let volume_id = ctx
            .volume_id()
            .ok_or_else(|| DriverError::MissingVolume {
                instance_id: ctx.instance_id.clone(),
            })?
            .to_string();

        let settled = ctx
            .modification
            .as_ref()
            .is_some_and(|m| m.volume_id == volume_id && !m.state.is_pending());
        if !settled {
            let poll = &self.config.poll;
            let record = poll_until_terminal(
                || check_state(&self.storage, &volume_id),
                poll.interval()?,
                poll.max_attempts,
            )
            .await?;
            ctx.modification = Some(record);
        }

        if let Some(record) = &ctx.modification
            && !record.state.is_completed()
        {
            warn!(
                volume = %record.volume_id,
                state = %record.state,
                "modification did not complete, skipping expansion"
            );
            return Err(DriverError::ModificationFailed {
                volume_id: record.volume_id.clone(),
                state: record.state.clone(),
            });
        }

        if ctx.expansion.is_none() {
            let instance_id = ctx
                .resize
                .as_ref()
                .and_then(InitiateOutcome::resize)
                .map(|r| r.instance_id.clone())
                .unwrap_or_else(|| ctx.instance_id.clone());
            let record = expand_filesystem(&self.remote, &self.config.expander, &instance_id).await?;
            ctx.expansion = Some(record);
        }

        info!(instance = %ctx.instance_id, volume = %volume_id, "pipeline finished");
        Ok(ctx)
    }
}
