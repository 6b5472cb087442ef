//! RHI error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    #[error("No suitable GPU found")]
    NoSuitableGpu,

    #[error("Shader error: {0}")]
    ShaderError(String),

    #[error("Surface error: {0}")]
    SurfaceError(String),

    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    #[error("Buffer error: {0}")]
    BufferError(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Descriptor allocation failed after the pool was grown and the
    /// allocation retried.
    #[error("Descriptor pool exhausted (retried after growing: {retried})")]
    DescriptorPoolExhausted { retried: bool },

    #[error("Texture error: {0}")]
    TextureError(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
