//! Renderer error types.

use thiserror::Error;

use tessera_resources::ResourceError;
use tessera_rhi::RhiError;
use tessera_scene::SceneError;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Core(#[from] tessera_core::Error),

    /// A draw referenced a material with no descriptor set on the GPU.
    #[error("No descriptor set for material {0}")]
    MissingMaterialSet(u32),

    /// Failure reported by a non-Vulkan [`FrameBackend`](crate::FrameBackend).
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<ash::vk::Result> for RendererError {
    fn from(result: ash::vk::Result) -> Self {
        Self::Rhi(result.into())
    }
}

pub type RendererResult<T> = std::result::Result<T, RendererError>;
