//! Filesystem expansion.
//!
//! Submits a two-command shell sequence to the instance: grow the root
//! partition to the end of the enlarged device, then grow the filesystem
//! to the end of the partition. Submission is the whole contract; the
//! commands run asynchronously on the instance and their outcome is not
//! observed here.
//!
//! The device and partition come from [`ExpanderConfig`], not from the
//! resized volume, so they must match the instance's real root layout.

use tracing::{error, info};

use volgrow_core::{
    ExpanderConfig, ExpansionRecord, RemoteExecApi, STATUS_PARTITION_EXPANDED, VolgrowError,
    VolgrowResult,
};

/// Shell commands that grow the configured partition and its filesystem.
pub fn expansion_commands(config: &ExpanderConfig) -> Vec<String> {
    vec![
        format!("sudo growpart {} {}", config.device, config.partition_number),
        format!("sudo resize2fs {}", config.partition_path),
    ]
}

/// Submit the expansion commands to `instance_id`.
///
/// Returns once the remote-execution backend accepts the submission.
pub async fn expand_filesystem<R>(
    remote: &R,
    config: &ExpanderConfig,
    instance_id: &str,
) -> VolgrowResult<ExpansionRecord>
where
    R: RemoteExecApi + ?Sized,
{
    if instance_id.is_empty() {
        return Err(VolgrowError::MissingConfig("INSTANCE_ID"));
    }
    check_device_path("expander.device", &config.device)?;
    check_device_path("expander.partition_path", &config.partition_path)?;
    if config.document_name.is_empty() {
        return Err(VolgrowError::InvalidConfig(
            "expander.document_name is empty".to_string(),
        ));
    }

    let commands = expansion_commands(config);
    let ack = remote
        .submit_command(instance_id, &config.document_name, &commands)
        .await
        .inspect_err(|e| error!(instance = %instance_id, error = %e, "command submission failed"))?;

    info!(
        instance = %instance_id,
        command_id = %ack.command_id,
        device = %config.device,
        partition = %config.partition_path,
        "expansion command submitted"
    );

    Ok(ExpansionRecord {
        instance_id: instance_id.to_string(),
        status: STATUS_PARTITION_EXPANDED.to_string(),
        command_id: ack.command_id,
    })
}

/// Paths are interpolated into a shell command line, so only plain device
/// nodes are accepted.
fn check_device_path(field: &str, path: &str) -> VolgrowResult<()> {
    let plain = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '.'));
    if !path.starts_with("/dev/") || !plain || path.contains("..") {
        return Err(VolgrowError::InvalidConfig(format!(
            "{field} is not a device path: {path:?}"
        )));
    }
    Ok(())
}
