//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin, owning wrappers over `ash`. Every object that owns a Vulkan handle
//! holds an `Arc<Device>` and destroys the handle in `Drop`. Covers:
//! - instance, physical device selection and logical device
//! - swapchain with explicit out-of-date / suboptimal outcomes
//! - per-slot synchronization primitives
//! - command recording, buffers, images and textures
//! - descriptor sets with a growable pool allocator
//! - dynamic-rendering graphics pipelines

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
