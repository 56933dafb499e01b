use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProfilerError, Result};

/// Profiler configuration, loaded from vkprof.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Timestamp granularity
    #[serde(default)]
    pub mode: ProfilerMode,
    /// Where collected timestamps are read back
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Allocate the on-screen overlay resources on each device
    #[serde(default)]
    pub overlay: bool,
    /// Timestamp queries available to each primary command buffer
    #[serde(default = "default_query_pool_size")]
    pub query_pool_size: u32,
    /// Track vkAllocateMemory / vkFreeMemory
    #[serde(default = "default_true")]
    pub memory_tracking: bool,
}

/// Granularity of GPU timestamps written into profiled command buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilerMode {
    #[default]
    PerDrawcall,
    PerPipeline,
    PerRenderPass,
    PerFrame,
}

/// Point at which the layer waits for timestamp results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Present,
    Submit,
}

impl ProfilerMode {
    /// Convert from the raw `VkProfilerModeEXT` value.
    pub fn from_raw(value: i32) -> Result<Self> {
        match value {
            0 => Ok(ProfilerMode::PerDrawcall),
            1 => Ok(ProfilerMode::PerPipeline),
            2 => Ok(ProfilerMode::PerRenderPass),
            3 => Ok(ProfilerMode::PerFrame),
            _ => Err(ProfilerError::InvalidEnum { name: "VkProfilerModeEXT", value }),
        }
    }

    pub fn times_render_passes(self) -> bool {
        matches!(
            self,
            ProfilerMode::PerDrawcall | ProfilerMode::PerPipeline | ProfilerMode::PerRenderPass
        )
    }

    pub fn times_pipelines(self) -> bool {
        self == ProfilerMode::PerPipeline
    }

    pub fn times_drawcalls(self) -> bool {
        self == ProfilerMode::PerDrawcall
    }
}

impl SyncMode {
    /// Convert from the raw `VkProfilerSyncModeEXT` value.
    pub fn from_raw(value: i32) -> Result<Self> {
        match value {
            0 => Ok(SyncMode::Present),
            1 => Ok(SyncMode::Submit),
            _ => Err(ProfilerError::InvalidEnum { name: "VkProfilerSyncModeEXT", value }),
        }
    }
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            mode: ProfilerMode::default(),
            sync_mode: SyncMode::default(),
            overlay: false,
            query_pool_size: default_query_pool_size(),
            memory_tracking: true,
        }
    }
}

impl ProfilerConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    /// A file that exists but fails to parse is reported and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                debug!("loaded profiler config from {}", path.display());
                config
            }
            Err(ProfilerError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                warn!("ignoring profiler config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from the platform default location (see
    /// [`vkprof_common::platform::default_config_path`]).
    pub fn load_default_location() -> Self {
        Self::load_or_default(&vkprof_common::platform::default_config_path())
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn default_query_pool_size() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}
