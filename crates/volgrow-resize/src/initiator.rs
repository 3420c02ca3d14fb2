//! Size calculation and resize initiation.
//!
//! Resolves the instance's root volume, reads its current size and
//! modification state, computes the target size, and issues at most one
//! resize request per call.

use chrono::Utc;
use tracing::{error, info, warn};

use volgrow_core::{
    BackendError, GrowthConfig, InitiateOutcome, ModificationState, ResizePlan, ResizeRecord, StorageApi,
    VolgrowError, VolgrowResult,
};

/// Target size for a volume of `current` GiB.
///
/// Rounds up so growth is never truncated below the requested percentage,
/// then clamps to `max_size_gib`. The result may be at or below `current`
/// when the ceiling is already reached.
pub fn target_size(current: u32, growth_percent: f64, max_size_gib: u32) -> u32 {
    let grown = (f64::from(current) * (100.0 + growth_percent) / 100.0).ceil();
    let grown = if grown.is_nan() || grown <= 0.0 {
        0
    } else if grown >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        grown as u32
    };
    grown.min(max_size_gib)
}

/// Freshly read resize plan plus the volume's modification state.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub plan: ResizePlan,
    pub state: ModificationState,
}

/// Read the root volume and compute a plan. Issues no writes.
pub async fn plan_resize<S>(storage: &S, config: &GrowthConfig) -> VolgrowResult<Assessment>
where
    S: StorageApi + ?Sized,
{
    let instance_id = config.require_instance_id()?;
    config.validate()?;

    let instance = storage
        .describe_instance(instance_id)
        .await
        .inspect_err(|e| error!(instance = %instance_id, error = %e, "describe instance failed"))?;

    let volume_id = instance
        .volume_for_device(&config.root_device_name)
        .ok_or_else(|| VolgrowError::RootDeviceNotFound {
            instance_id: instance_id.to_string(),
            device_name: config.root_device_name.clone(),
        })?;

    let volume = storage
        .describe_volume(volume_id)
        .await
        .inspect_err(|e| error!(volume = %volume_id, error = %e, "describe volume failed"))?;

    let new_size = target_size(volume.size, config.growth_percent, config.max_size_gib);

    Ok(Assessment {
        plan: ResizePlan {
            instance_id: instance_id.to_string(),
            volume_id: volume.id.clone(),
            current_size: volume.size,
            new_size,
        },
        state: volume.modification_state(),
    })
}

/// Grow the root volume by one step.
///
/// Returns `Skipped` when the target does not exceed the current size,
/// fails with `ConflictingModification` while a modification is in
/// flight, and otherwise issues exactly one resize request.
pub async fn initiate<S>(storage: &S, config: &GrowthConfig) -> VolgrowResult<InitiateOutcome>
where
    S: StorageApi + ?Sized,
{
    let Assessment { plan, state } = plan_resize(storage, config).await?;

    if !plan.grows() {
        info!(
            volume = %plan.volume_id,
            size = plan.current_size,
            max_size_gib = config.max_size_gib,
            "resize skipped, already at max size"
        );
        return Ok(InitiateOutcome::skipped_at_max());
    }

    if state.is_pending() {
        warn!(volume = %plan.volume_id, %state, "modification already in progress");
        return Err(VolgrowError::ConflictingModification {
            volume_id: plan.volume_id,
            state,
        });
    }

    // The volume can start modifying between the read above and this call.
    match storage.modify_volume_size(&plan.volume_id, plan.new_size).await {
        Ok(_) => {}
        Err(BackendError::Conflict { volume_id, state }) => {
            warn!(volume = %volume_id, %state, "resize rejected, modification already in progress");
            return Err(VolgrowError::ConflictingModification { volume_id, state });
        }
        Err(e) => {
            error!(volume = %plan.volume_id, error = %e, "resize request failed");
            return Err(e.into());
        }
    }

    info!(
        instance = %plan.instance_id,
        volume = %plan.volume_id,
        from = plan.current_size,
        to = plan.new_size,
        "resize initiated"
    );

    Ok(InitiateOutcome::Initiated(ResizeRecord {
        instance_id: plan.instance_id,
        volume_id: plan.volume_id,
        current_size: plan.current_size,
        new_size: plan.new_size,
        modification_time: Utc::now(),
    }))
}
