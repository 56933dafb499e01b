//! Integration test: profiler configuration
//!
//! Run with: cargo test --test config_test

use std::path::PathBuf;

use vkprof_core::{ProfilerConfig, ProfilerError, ProfilerMode, SyncMode};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vkprof-{}-{}.toml", name, std::process::id()))
}

#[test]
fn test_defaults() {
    let config = ProfilerConfig::default();
    assert_eq!(config.mode, ProfilerMode::PerDrawcall);
    assert_eq!(config.sync_mode, SyncMode::Present);
    assert!(!config.overlay);
    assert_eq!(config.query_pool_size, 1024);
    assert!(config.memory_tracking);
}

#[test]
fn test_parse_partial_toml() {
    let config = ProfilerConfig::from_toml_str("mode = \"per_render_pass\"\noverlay = true\n")
        .expect("valid config");
    assert_eq!(config.mode, ProfilerMode::PerRenderPass);
    assert!(config.overlay);
    assert_eq!(config.sync_mode, SyncMode::Present);
    assert_eq!(config.query_pool_size, 1024);
}

#[test]
fn test_parse_full_toml() {
    let text = r#"
        mode = "per_pipeline"
        sync_mode = "submit"
        overlay = false
        query_pool_size = 64
        memory_tracking = false
    "#;
    let config = ProfilerConfig::from_toml_str(text).ok();
    let expected = ProfilerConfig {
        mode: ProfilerMode::PerPipeline,
        sync_mode: SyncMode::Submit,
        overlay: false,
        query_pool_size: 64,
        memory_tracking: false,
    };
    assert_eq!(config, Some(expected));
}

#[test]
fn test_invalid_mode_is_error() {
    let result = ProfilerConfig::from_toml_str("mode = \"per_everything\"");
    assert!(matches!(result, Err(ProfilerError::Config(_))));
}

#[test]
fn test_toml_roundtrip_of_non_default_config() {
    let config = ProfilerConfig {
        mode: ProfilerMode::PerFrame,
        sync_mode: SyncMode::Submit,
        overlay: true,
        query_pool_size: 256,
        memory_tracking: false,
    };
    let text = config.to_toml_string().unwrap();
    assert!(text.contains("per_frame"));
    assert_eq!(ProfilerConfig::from_toml_str(&text).ok(), Some(config));
}

#[test]
fn test_load_or_default() {
    let missing = temp_path("missing");
    assert_eq!(ProfilerConfig::load_or_default(&missing), ProfilerConfig::default());

    let broken = temp_path("broken");
    std::fs::write(&broken, "mode = 42").unwrap();
    assert_eq!(ProfilerConfig::load_or_default(&broken), ProfilerConfig::default());

    let valid = temp_path("valid");
    std::fs::write(&valid, "sync_mode = \"submit\"").unwrap();
    assert_eq!(ProfilerConfig::load_or_default(&valid).sync_mode, SyncMode::Submit);

    let _ = std::fs::remove_file(broken);
    let _ = std::fs::remove_file(valid);
}

#[test]
fn test_raw_enum_conversion() {
    assert_eq!(ProfilerMode::from_raw(0).ok(), Some(ProfilerMode::PerDrawcall));
    assert_eq!(ProfilerMode::from_raw(3).ok(), Some(ProfilerMode::PerFrame));
    assert_eq!(SyncMode::from_raw(1).ok(), Some(SyncMode::Submit));

    let error = ProfilerMode::from_raw(4).expect_err("mode 4 is out of range");
    assert_eq!(error.to_vk_result(), ash::vk::Result::ERROR_VALIDATION_FAILED_EXT);
    assert!(SyncMode::from_raw(-1).is_err());
}

#[test]
fn test_mode_granularity() {
    assert!(ProfilerMode::PerDrawcall.times_drawcalls());
    assert!(!ProfilerMode::PerDrawcall.times_pipelines());
    assert!(ProfilerMode::PerPipeline.times_pipelines());
    assert!(ProfilerMode::PerRenderPass.times_render_passes());
    assert!(!ProfilerMode::PerFrame.times_render_passes());
}
