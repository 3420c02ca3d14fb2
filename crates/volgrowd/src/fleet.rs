//! Fleet files — seed data for the in-memory backend.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use volgrow_core::{Instance, MemoryCloud, Volume};

/// Instances and volumes to load into a [`MemoryCloud`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fleet {
    /// Let pending modifications progress on each volume read.
    #[serde(default = "default_auto_progress")]
    pub auto_progress: bool,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

fn default_auto_progress() -> bool {
    true
}

impl Fleet {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet file {}", path.display()))?;
        let fleet: Fleet = toml::from_str(&content)
            .with_context(|| format!("parsing fleet file {}", path.display()))?;
        Ok(fleet)
    }

    /// Build a backend holding this fleet.
    pub async fn into_cloud(self) -> MemoryCloud {
        let cloud = MemoryCloud::new();
        cloud.set_auto_progress(self.auto_progress).await;
        for instance in self.instances {
            cloud.put_instance(instance).await;
        }
        for volume in self.volumes {
            cloud.put_volume(volume).await;
        }
        cloud
    }
}
