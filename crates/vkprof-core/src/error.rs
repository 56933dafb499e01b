use ash::vk;

#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    #[error("handle not found: {0:#x}")]
    HandleNotFound(u64),

    #[error("Vulkan call failed: {0}")]
    Vulkan(vk::Result),

    #[error("invalid enum value {value} for {name}")]
    InvalidEnum { name: &'static str, value: i32 },

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vk::Result> for ProfilerError {
    fn from(result: vk::Result) -> Self {
        ProfilerError::Vulkan(result)
    }
}

impl ProfilerError {
    /// Result code reported to the application at the FFI boundary.
    pub fn to_vk_result(&self) -> vk::Result {
        match self {
            ProfilerError::Vulkan(result) => *result,
            ProfilerError::HandleNotFound(_) => vk::Result::ERROR_INITIALIZATION_FAILED,
            ProfilerError::InvalidEnum { .. } => vk::Result::ERROR_VALIDATION_FAILED_EXT,
            ProfilerError::Config(_) | ProfilerError::Io(_) => vk::Result::ERROR_INITIALIZATION_FAILED,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
