//! Frame scheduling and scene rendering.
//!
//! This crate orchestrates the rendering process:
//! - [`FrameScheduler`]: frames-in-flight ring, acquire/submit/present and
//!   swapchain rebuilds, generic over a [`FrameBackend`]
//! - [`CommandRecorder`]: turns a [`DrawList`](tessera_scene::DrawList) into
//!   encoder calls with redundant material binds elided
//! - [`VulkanBackend`]: the GPU side of both
//! - [`Renderer`]: instance, device and surface ownership on top

mod backend;
pub mod depth_buffer;
mod error;
pub mod frame;
mod frame_resources;
pub mod gpu_scene;
pub mod pipelines;
pub mod recorder;
mod renderer;
pub mod scheduler;
pub mod targets;
pub mod ubo;

pub use backend::VulkanBackend;
pub use error::{RendererError, RendererResult};
pub use frame::{FrameRing, SlotState};
pub use recorder::{
    Command, CommandEncoder, CommandRecorder, PipelineKind, RecordStats, RecordingEncoder,
};
pub use renderer::Renderer;
pub use scheduler::{FrameBackend, FrameScheduler, FrameStatus};
pub use ubo::{DrawConstants, FrameUniforms};

pub use tessera_rhi::swapchain::{SwapchainAcquire, SwapchainPresent};
