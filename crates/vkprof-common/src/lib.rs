pub mod logging;
pub mod platform;

pub use logging::init_logging;

/// Name under which the layer registers with the Vulkan loader.
pub const LAYER_NAME: &str = "VK_LAYER_profiler";

pub const LAYER_DESCRIPTION: &str = "GPU profiling layer";

pub const LAYER_IMPLEMENTATION_VERSION: u32 = 1;
