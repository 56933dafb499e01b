//! Vulkan loader layer manifest (JSON).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

const FILE_FORMAT_VERSION: &str = "1.1.2";
const API_VERSION: &str = "1.3.0";

/// Environment variable that enables an implicit layer install.
pub const ENABLE_ENV: &str = "VKPROF_ENABLE";
/// Environment variable that disables an implicit layer install.
pub const DISABLE_ENV: &str = "VKPROF_DISABLE";

#[derive(Debug, Serialize)]
pub struct LayerManifest {
    pub file_format_version: &'static str,
    pub layer: LayerEntry,
}

#[derive(Debug, Serialize)]
pub struct LayerEntry {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub layer_type: &'static str,
    pub library_path: String,
    pub api_version: &'static str,
    pub implementation_version: String,
    pub description: &'static str,
    pub functions: BTreeMap<&'static str, &'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_environment: Option<BTreeMap<&'static str, &'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_environment: Option<BTreeMap<&'static str, &'static str>>,
}

impl LayerManifest {
    /// Build the manifest for a layer library at `library_path`. Implicit
    /// layers are loaded for every application and need enable/disable
    /// environment variables.
    pub fn new(library_path: &Path, implicit: bool) -> Self {
        let functions = BTreeMap::from([
            ("vkNegotiateLoaderLayerInterfaceVersion", "vkNegotiateLoaderLayerInterfaceVersion"),
            ("vkGetInstanceProcAddr", "vkprof_GetInstanceProcAddr"),
            ("vkGetDeviceProcAddr", "vkprof_GetDeviceProcAddr"),
        ]);
        Self {
            file_format_version: FILE_FORMAT_VERSION,
            layer: LayerEntry {
                name: vkprof_common::LAYER_NAME,
                layer_type: "GLOBAL",
                library_path: library_path.display().to_string(),
                api_version: API_VERSION,
                implementation_version: vkprof_common::LAYER_IMPLEMENTATION_VERSION.to_string(),
                description: vkprof_common::LAYER_DESCRIPTION,
                functions,
                enable_environment: implicit.then(|| BTreeMap::from([(ENABLE_ENV, "1")])),
                disable_environment: implicit.then(|| BTreeMap::from([(DISABLE_ENV, "1")])),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
