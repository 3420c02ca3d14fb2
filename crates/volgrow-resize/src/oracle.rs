//! Modification state lookup.
//!
//! A pure read: reports the state of a volume's most recent modification
//! as the backend tags it. A volume with no record, or a record without a
//! state, reads as `completed`.

use tracing::{debug, error};

use volgrow_core::{StateRecord, StorageApi, VolgrowError, VolgrowResult};

/// Report the current modification state of `volume_id`.
pub async fn check_state<S>(storage: &S, volume_id: &str) -> VolgrowResult<StateRecord>
where
    S: StorageApi + ?Sized,
{
    if volume_id.is_empty() {
        return Err(VolgrowError::MissingConfig("volume id"));
    }

    let volume = storage
        .describe_volume(volume_id)
        .await
        .inspect_err(|e| error!(volume = %volume_id, error = %e, "describe volume failed"))?;

    let state = volume.modification_state();
    debug!(
        volume = %volume_id,
        %state,
        records = volume.modifications.len(),
        "modification state"
    );

    Ok(StateRecord {
        volume_id: volume_id.to_string(),
        state,
    })
}
