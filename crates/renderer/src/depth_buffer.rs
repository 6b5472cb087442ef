//! Depth attachment sized to the swapchain.
//!
//! The depth buffer is the renderer's only size-dependent attachment besides
//! the swapchain images themselves, and is recreated with them on every
//! rebuild.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use tessera_rhi::RhiResult;
use tessera_rhi::device::Device;
use tessera_rhi::image::{GpuImage, layout_transition};

/// Default depth buffer format (32-bit floating point).
pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth value the pass clears to; the pipelines compare with `LESS`.
pub const DEPTH_CLEAR: f32 = 1.0;

pub struct DepthBuffer {
    image: GpuImage,
}

impl DepthBuffer {
    /// Creates a depth buffer with the default format.
    ///
    /// # Errors
    ///
    /// Fails for a zero extent, or when image creation or allocation fails.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        Self::with_format(device, extent, DEFAULT_DEPTH_FORMAT)
    }

    pub fn with_format(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> RhiResult<Self> {
        let image = GpuImage::new(
            device,
            "depth_buffer",
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;
        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, format
        );
        Ok(Self { image })
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.image()
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }

    /// Barrier discarding the previous contents and making the image ready
    /// for depth testing. Recorded at the start of every frame.
    pub fn begin_frame_barrier(&self) -> vk::ImageMemoryBarrier2<'static> {
        layout_transition(
            self.image(),
            vk::ImageAspectFlags::DEPTH,
            (
                vk::ImageLayout::UNDEFINED,
                vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            (
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
        )
    }
}

/// Whether `format` carries a depth component usable as this attachment.
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM
    )
}
