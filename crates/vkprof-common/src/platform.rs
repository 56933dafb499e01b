use std::path::{Path, PathBuf};

/// File name of the profiler configuration.
pub const CONFIG_FILE_NAME: &str = "vkprof.toml";

/// Returns the system-wide configuration path for this platform.
pub fn system_config_path() -> PathBuf {
    #[cfg(windows)]
    {
        let programdata = std::env::var("PROGRAMDATA")
            .unwrap_or_else(|_| r"C:\ProgramData".to_string());
        Path::new(&programdata).join("vkprof").join(CONFIG_FILE_NAME)
    }
    #[cfg(not(windows))]
    {
        Path::new("/etc/vkprof").join(CONFIG_FILE_NAME)
    }
}

/// Returns the config file path to use.
/// Search order:
/// 1. `VKPROF_CONFIG` environment variable
/// 2. System-wide config (see [`system_config_path`])
/// 3. Local fallback: `./vkprof.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("VKPROF_CONFIG") {
        return PathBuf::from(path);
    }
    let system_path = system_config_path();
    if system_path.exists() {
        return system_path;
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// File name of the layer shared library on this platform.
pub fn layer_library_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "vkprof_layer.dll" }
    #[cfg(target_os = "macos")]
    { "libvkprof_layer.dylib" }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    { "libvkprof_layer.so" }
}

/// Returns the platform name string.
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "windows" }
    #[cfg(target_os = "linux")]
    { "linux" }
    #[cfg(target_os = "macos")]
    { "macos" }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    { "unknown" }
}
