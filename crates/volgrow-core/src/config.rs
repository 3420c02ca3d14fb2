//! volgrow.toml configuration.
//!
//! Every component takes its configuration as an explicit record. The file
//! layout is:
//!
//! ```toml
//! [growth]
//! instance_id = "i-0123456789abcdef0"
//! root_device_name = "/dev/xvda"
//! growth_percent = 20
//! max_size_gib = 200
//!
//! [expander]
//! device = "/dev/nvme0n1"
//! partition_number = 1
//! partition_path = "/dev/nvme0n1p1"
//!
//! [poll]
//! interval = "15s"
//! max_attempts = 40
//!
//! [retry]
//! initial_backoff = "30s"
//! max_backoff = "5m"
//! max_attempts = 5
//! ```
//!
//! Environment variables (`INSTANCE_ID`, `ROOT_DEVICE_NAME`,
//! `GROWTH_PERCENT`, `MAX_SIZE_GIB`) override the `[growth]` table.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{VolgrowError, VolgrowResult};

pub const ENV_INSTANCE_ID: &str = "INSTANCE_ID";
pub const ENV_ROOT_DEVICE_NAME: &str = "ROOT_DEVICE_NAME";
pub const ENV_GROWTH_PERCENT: &str = "GROWTH_PERCENT";
pub const ENV_MAX_SIZE_GIB: &str = "MAX_SIZE_GIB";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolgrowConfig {
    #[serde(default)]
    pub growth: GrowthConfig,
    #[serde(default)]
    pub expander: ExpanderConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl VolgrowConfig {
    pub fn from_file(path: &Path) -> VolgrowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VolgrowError::InvalidConfig(format!("read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> VolgrowResult<Self> {
        toml::from_str(content).map_err(|e| VolgrowError::InvalidConfig(e.to_string()))
    }

    /// Check every section. Instance id presence is checked by the
    /// initiator, since other steps can run without it.
    pub fn validate(&self) -> VolgrowResult<()> {
        self.growth.validate()?;
        self.poll.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Sizing policy for the root volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrowthConfig {
    /// Instance whose root volume is grown.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Device name of the root block-device mapping.
    #[serde(default = "default_root_device_name")]
    pub root_device_name: String,
    /// Growth per step in percentage points (20.0 means 20%).
    #[serde(default = "default_growth_percent")]
    pub growth_percent: f64,
    /// Absolute size ceiling in GiB.
    #[serde(default = "default_max_size_gib")]
    pub max_size_gib: u32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            root_device_name: default_root_device_name(),
            growth_percent: default_growth_percent(),
            max_size_gib: default_max_size_gib(),
        }
    }
}

impl GrowthConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> VolgrowResult<Self> {
        Self::default().with_process_env()
    }

    /// Overlay the process environment onto `self`.
    pub fn with_process_env(self) -> VolgrowResult<Self> {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` (an environment accessor) onto `self`.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> VolgrowResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = lookup(ENV_INSTANCE_ID) {
            self.instance_id = Some(id);
        }
        if let Some(device) = lookup(ENV_ROOT_DEVICE_NAME) {
            self.root_device_name = device;
        }
        if let Some(raw) = lookup(ENV_GROWTH_PERCENT) {
            self.growth_percent = raw.trim().parse().map_err(|_| {
                VolgrowError::InvalidConfig(format!("{ENV_GROWTH_PERCENT}={raw} is not a number"))
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_SIZE_GIB) {
            self.max_size_gib = raw.trim().parse().map_err(|_| {
                VolgrowError::InvalidConfig(format!("{ENV_MAX_SIZE_GIB}={raw} is not a size"))
            })?;
        }
        Ok(self)
    }

    /// The configured instance id, or a misconfiguration error.
    pub fn require_instance_id(&self) -> VolgrowResult<&str> {
        self.instance_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(VolgrowError::MissingConfig(ENV_INSTANCE_ID))
    }

    pub fn validate(&self) -> VolgrowResult<()> {
        if !self.growth_percent.is_finite() || self.growth_percent <= 0.0 {
            return Err(VolgrowError::InvalidConfig(format!(
                "growth_percent must be positive, got {}",
                self.growth_percent
            )));
        }
        if self.max_size_gib == 0 {
            return Err(VolgrowError::InvalidConfig(
                "max_size_gib must be positive".to_string(),
            ));
        }
        if self.root_device_name.is_empty() {
            return Err(VolgrowError::MissingConfig(ENV_ROOT_DEVICE_NAME));
        }
        Ok(())
    }
}

/// Where the expansion commands point.
///
/// These paths are fixed and not derived from the resized volume, so they
/// must match the instance's actual root layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpanderConfig {
    /// Whole block device holding the root partition.
    #[serde(default = "default_device")]
    pub device: String,
    /// Partition number on `device` to grow.
    #[serde(default = "default_partition_number")]
    pub partition_number: u32,
    /// Device node of the grown partition, holding the filesystem.
    #[serde(default = "default_partition_path")]
    pub partition_path: String,
    /// Remote-execution document that runs shell commands.
    #[serde(default = "default_document_name")]
    pub document_name: String,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            partition_number: default_partition_number(),
            partition_path: default_partition_path(),
            document_name: default_document_name(),
        }
    }
}

/// Cadence for polling the modification state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollConfig {
    /// Delay between observations (e.g. "15s").
    #[serde(default = "default_poll_interval")]
    pub interval: String,
    /// Observations before giving up.
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: default_poll_attempts(),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval: format_duration(interval),
            max_attempts,
        }
    }

    pub fn interval(&self) -> VolgrowResult<Duration> {
        parse_field("poll.interval", &self.interval)
    }

    pub fn validate(&self) -> VolgrowResult<()> {
        self.interval()?;
        if self.max_attempts == 0 {
            return Err(VolgrowError::InvalidConfig(
                "poll.max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Backoff for retrying the initiator after a conflicting modification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: String,
    #[serde(default = "default_max_backoff")]
    pub max_backoff: String,
    /// Total attempts, including the first.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            max_attempts: default_retry_attempts(),
        }
    }
}

impl RetryConfig {
    pub fn new(initial_backoff: Duration, max_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            initial_backoff: format_duration(initial_backoff),
            max_backoff: format_duration(max_backoff),
            max_attempts,
        }
    }

    pub fn initial_backoff(&self) -> VolgrowResult<Duration> {
        parse_field("retry.initial_backoff", &self.initial_backoff)
    }

    pub fn max_backoff(&self) -> VolgrowResult<Duration> {
        parse_field("retry.max_backoff", &self.max_backoff)
    }

    pub fn validate(&self) -> VolgrowResult<()> {
        let initial = self.initial_backoff()?;
        let max = self.max_backoff()?;
        if initial > max {
            return Err(VolgrowError::InvalidConfig(
                "retry.initial_backoff exceeds retry.max_backoff".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(VolgrowError::InvalidConfig(
                "retry.max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_root_device_name() -> String {
    "/dev/xvda".to_string()
}

fn default_growth_percent() -> f64 {
    20.0
}

fn default_max_size_gib() -> u32 {
    16384
}

fn default_device() -> String {
    "/dev/nvme0n1".to_string()
}

fn default_partition_number() -> u32 {
    1
}

fn default_partition_path() -> String {
    "/dev/nvme0n1p1".to_string()
}

fn default_document_name() -> String {
    "AWS-RunShellScript".to_string()
}

fn default_poll_interval() -> String {
    "15s".to_string()
}

fn default_poll_attempts() -> u32 {
    40
}

fn default_initial_backoff() -> String {
    "30s".to_string()
}

fn default_max_backoff() -> String {
    "5m".to_string()
}

fn default_retry_attempts() -> u32 {
    5
}

fn parse_field(name: &str, value: &str) -> VolgrowResult<Duration> {
    parse_duration(value)
        .ok_or_else(|| VolgrowError::InvalidConfig(format!("{name}: invalid duration {value:?}")))
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_validate() {
        let config = VolgrowConfig::default();
        config.validate().unwrap();
        assert_eq!(config.growth.root_device_name, "/dev/xvda");
        assert_eq!(config.expander.partition_path, "/dev/nvme0n1p1");
    }

    #[test]
    fn parse_full_file() {
        let config = VolgrowConfig::from_toml_str(
            r#"
[growth]
instance_id = "i-0abc"
root_device_name = "/dev/sda1"
growth_percent = 25
max_size_gib = 500

[expander]
device = "/dev/xvda"
partition_path = "/dev/xvda1"

[poll]
interval = "500ms"
max_attempts = 3
"#,
        )
        .unwrap();

        assert_eq!(config.growth.instance_id.as_deref(), Some("i-0abc"));
        assert_eq!(config.growth.growth_percent, 25.0);
        assert_eq!(config.growth.max_size_gib, 500);
        assert_eq!(config.expander.partition_number, 1);
        assert_eq!(config.poll.interval().unwrap(), Duration::from_millis(500));
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn env_overrides_file_values() {
        let growth = GrowthConfig::default()
            .with_env_overrides(env(&[
                (ENV_INSTANCE_ID, "i-env"),
                (ENV_GROWTH_PERCENT, "10"),
                (ENV_MAX_SIZE_GIB, "300"),
            ]))
            .unwrap();

        assert_eq!(growth.require_instance_id().unwrap(), "i-env");
        assert_eq!(growth.growth_percent, 10.0);
        assert_eq!(growth.max_size_gib, 300);
        assert_eq!(growth.root_device_name, "/dev/xvda");
    }

    #[test]
    fn from_env_reads_process_environment() {
        const KEYS: [&str; 4] = [
            ENV_INSTANCE_ID,
            ENV_ROOT_DEVICE_NAME,
            ENV_GROWTH_PERCENT,
            ENV_MAX_SIZE_GIB,
        ];
        let saved: Vec<_> = KEYS.iter().map(|k| std::env::var(k).ok()).collect();

        // SAFETY: no other test in this crate touches these variables, and
        // they are restored before the test returns.
        unsafe {
            std::env::set_var(ENV_INSTANCE_ID, "i-process");
            std::env::set_var(ENV_GROWTH_PERCENT, "15");
            std::env::remove_var(ENV_ROOT_DEVICE_NAME);
            std::env::remove_var(ENV_MAX_SIZE_GIB);
        }
        let growth = GrowthConfig::from_env();
        for (key, value) in KEYS.iter().zip(saved) {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }

        let growth = growth.unwrap();
        assert_eq!(growth.require_instance_id().unwrap(), "i-process");
        assert_eq!(growth.growth_percent, 15.0);
        assert_eq!(growth.root_device_name, "/dev/xvda");
        assert_eq!(growth.max_size_gib, 16384);
    }

    #[test]
    fn unparseable_env_value_is_misconfiguration() {
        let err = GrowthConfig::default()
            .with_env_overrides(env(&[(ENV_MAX_SIZE_GIB, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_SIZE_GIB));
        assert!(!err.is_retryable());
    }

    #[test]
    fn empty_instance_id_is_missing() {
        let growth = GrowthConfig {
            instance_id: Some(String::new()),
            ..GrowthConfig::default()
        };
        assert!(matches!(
            growth.require_instance_id(),
            Err(VolgrowError::MissingConfig(ENV_INSTANCE_ID))
        ));
    }

    #[test]
    fn rejects_non_positive_growth() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let growth = GrowthConfig {
                growth_percent: bad,
                ..GrowthConfig::default()
            };
            assert!(growth.validate().is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn rejects_inverted_backoff() {
        let retry = RetryConfig::new(Duration::from_secs(60), Duration::from_secs(5), 3);
        assert!(retry.validate().is_err());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn constructed_durations_round_trip() {
        let poll = PollConfig::new(Duration::from_millis(250), 4);
        assert_eq!(poll.interval().unwrap(), Duration::from_millis(250));

        let retry = RetryConfig::new(Duration::from_secs(1), Duration::from_secs(60), 3);
        assert_eq!(retry.max_backoff().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volgrow.toml");
        std::fs::write(&path, "[growth]\nmax_size_gib = 64\n").unwrap();

        let config = VolgrowConfig::from_file(&path).unwrap();
        assert_eq!(config.growth.max_size_gib, 64);
    }
}
