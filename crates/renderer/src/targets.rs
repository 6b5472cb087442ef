//! Size-dependent render targets: the swapchain and its depth attachment.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use tessera_rhi::RhiResult;
use tessera_rhi::device::Device;
use tessera_rhi::image::layout_transition;
use tessera_rhi::swapchain::Swapchain;

use crate::depth_buffer::DepthBuffer;

/// Surface the targets present to. The handle is borrowed; the owner keeps
/// the surface alive for as long as the targets exist.
#[derive(Clone)]
pub struct SurfaceRef {
    pub handle: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

pub struct SurfaceTargets {
    device: Arc<Device>,
    surface: SurfaceRef,
    swapchain: Swapchain,
    depth: DepthBuffer,
    min_images: u32,
}

impl SurfaceTargets {
    pub fn new(
        instance: &ash::Instance,
        device: Arc<Device>,
        surface: SurfaceRef,
        extent: vk::Extent2D,
        min_images: u32,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(
            instance,
            &surface.loader,
            device.clone(),
            surface.handle,
            extent,
            min_images,
        )?;
        let depth = DepthBuffer::new(device.clone(), swapchain.extent())?;
        Ok(Self {
            device,
            surface,
            swapchain,
            depth,
            min_images,
        })
    }

    /// Recreates the swapchain and depth buffer for `extent`. The device must
    /// be idle.
    pub fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        self.swapchain.recreate(
            &self.surface.loader,
            self.surface.handle,
            extent,
            self.min_images,
        )?;
        self.depth = DepthBuffer::new(self.device.clone(), self.swapchain.extent())?;
        debug!(
            "Surface targets rebuilt: {} image(s) at {}x{}",
            self.swapchain.image_count(),
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(())
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn depth(&self) -> &DepthBuffer {
        &self.depth
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.swapchain.format()
    }
}

/// Swapchain image from whatever the presentation engine left to color
/// attachment.
pub fn color_attachment_barrier(image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
    layout_transition(
        image,
        vk::ImageAspectFlags::COLOR,
        (
            vk::ImageLayout::UNDEFINED,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::NONE,
        ),
        (
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
    )
}

/// Color attachment to presentable.
pub fn present_barrier(image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
    layout_transition(
        image,
        vk::ImageAspectFlags::COLOR,
        (
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        (
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            vk::AccessFlags2::NONE,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barriers_chain_layouts() {
        let begin = color_attachment_barrier(vk::Image::null());
        let end = present_barrier(vk::Image::null());
        assert_eq!(begin.new_layout, end.old_layout);
        assert_eq!(end.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(begin.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
    }
}
