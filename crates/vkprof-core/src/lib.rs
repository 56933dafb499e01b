//! Device-side profiling state for the vkprof Vulkan layer.
//!
//! Everything in this crate is independent of the loader ABI: the layer feeds
//! intercepted calls in, and GPU access goes through the [`TimestampWriter`]
//! and [`TimestampReader`] traits so the logic can run without a driver.

pub mod command_buffer;
pub mod config;
pub mod data;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod profiler;
pub mod queue;
pub mod region;

pub use command_buffer::{CommandBufferProfiler, TimestampReader, TimestampWriter};
pub use config::{ProfilerConfig, ProfilerMode, SyncMode};
pub use error::{ProfilerError, Result};
pub use profiler::DeviceProfiler;
