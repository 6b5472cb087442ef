//! Swapchain: the presentable image chain and its views.
//!
//! The swapchain is the only size-dependent object in this crate. The renderer
//! rebuilds it through [`Swapchain::recreate`] whenever the surface reports it
//! stale or the window is resized; image views of the previous chain are
//! destroyed before the new chain's are created.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::subresource_range;

/// Result of asking the presentation engine for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainAcquire {
    /// An image is ready; `suboptimal` means it can still be rendered and
    /// presented but the chain should be rebuilt afterwards.
    Image { index: u32, suboptimal: bool },
    /// The surface changed incompatibly; nothing was acquired.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainPresent {
    Optimal,
    Suboptimal,
    OutOfDate,
}

#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: surface_loader
                    .get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            })
        }
    }
}

pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: OwnedViews,
    format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a swapchain sized to the surface, falling back to `desired`
    /// when the surface leaves the extent to the application.
    ///
    /// `min_images` is the buffering depth the renderer runs with; the chain
    /// never holds fewer images than that.
    pub fn new(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        desired: vk::Extent2D,
        min_images: u32,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance, device.handle());
        let mut swapchain = Self {
            device,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: OwnedViews::default(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
        };
        swapchain.build(surface_loader, surface, desired, min_images)?;
        Ok(swapchain)
    }

    /// Rebuilds the chain for a new surface size.
    ///
    /// The caller must have drained the GPU; the old views are destroyed
    /// immediately and the old chain is retired after the new one exists.
    pub fn recreate(
        &mut self,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        desired: vk::Extent2D,
        min_images: u32,
    ) -> RhiResult<()> {
        info!(
            "Recreating swapchain: {}x{} -> {}x{}",
            self.extent.width, self.extent.height, desired.width, desired.height
        );
        self.destroy_image_views();
        self.build(surface_loader, surface, desired, min_images)
    }

    fn build(
        &mut self,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        desired: vk::Extent2D,
        min_images: u32,
    ) -> RhiResult<()> {
        let support =
            SwapchainSupport::query(self.device.physical_device(), surface, surface_loader)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(RhiError::SwapchainError(
                "surface reports no formats or present modes".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, desired);
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SwapchainError(format!(
                "refusing to build a {}x{} swapchain",
                extent.width, extent.height
            )));
        }
        let image_count = determine_image_count(&support.capabilities, min_images);

        let families = self.device.queue_families();
        let indices: Vec<u32> = families.unique_families();
        let sharing_mode = if indices.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };
        let shared_indices: &[u32] = if indices.len() > 1 { &indices } else { &[] };

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None)? };
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;

        self.images = unsafe { self.loader.get_swapchain_images(swapchain)? };
        let views = create_image_views(&self.device, &self.images, surface_format.format)?;
        let device = &self.device;
        self.image_views.replace(views, |view| unsafe {
            device.handle().destroy_image_view(view, None)
        });
        self.format = surface_format.format;
        self.extent = extent;
        self.present_mode = present_mode;

        info!(
            "Swapchain ready: {}x{}, {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            self.images.len()
        );
        Ok(())
    }

    /// Requests the next presentable image, signaling `semaphore` once the
    /// presentation engine has released it.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<SwapchainAcquire> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => Ok(SwapchainAcquire::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainAcquire::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<SwapchainPresent> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(SwapchainPresent::Optimal),
            Ok(true) => Ok(SwapchainPresent::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainPresent::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views.get(index)
    }

    fn destroy_image_views(&mut self) {
        let device = &self.device;
        self.image_views
            .release(|view| unsafe { device.handle().destroy_image_view(view, None) });
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(self.swapchain, None) };
            debug!(
                "Swapchain destroyed ({}x{})",
                self.extent.width, self.extent.height
            );
        }
    }
}

/// Views over the current chain's images.
///
/// Every view stored here is passed to `destroy` exactly once: when it is
/// replaced by the next chain's views, or on `release`.
#[derive(Debug, Default)]
struct OwnedViews {
    views: Vec<vk::ImageView>,
}

impl OwnedViews {
    #[inline]
    fn get(&self, index: usize) -> vk::ImageView {
        self.views[index]
    }

    fn release(&mut self, mut destroy: impl FnMut(vk::ImageView)) {
        for view in self.views.drain(..) {
            destroy(view);
        }
    }

    fn replace(&mut self, views: Vec<vk::ImageView>, destroy: impl FnMut(vk::ImageView)) {
        self.release(destroy);
        self.views = views;
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let srgb = |format: vk::Format| {
        formats.iter().copied().find(|f| {
            f.format == format && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
    };

    if let Some(format) = srgb(vk::Format::B8G8R8A8_SRGB).or_else(|| srgb(vk::Format::R8G8B8A8_SRGB))
    {
        return format;
    }

    warn!("No sRGB surface format, using {:?}", formats[0].format);
    formats[0]
}

fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, min_images: u32) -> u32 {
    let preferred = (capabilities.min_image_count + 1).max(min_images);
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR));

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(e) => {
                for view in views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "failed to create image view: {:?}",
                    e
                )));
            }
        }
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    fn view(raw: u64) -> vk::ImageView {
        vk::ImageView::from_raw(raw)
    }

    #[test]
    fn test_recreate_destroys_every_prior_view_once() {
        let mut owned = OwnedViews::default();
        let mut destroyed = Vec::new();

        owned.replace(vec![view(1), view(2), view(3)], |v| destroyed.push(v));
        assert!(destroyed.is_empty());
        assert_eq!(owned.views.len(), 3);

        // recreate: release the old views, then build installs the new ones.
        owned.release(|v| destroyed.push(v));
        owned.replace(vec![view(4), view(5)], |v| destroyed.push(v));
        assert_eq!(destroyed, vec![view(1), view(2), view(3)]);
        assert_eq!(owned.get(1), view(5));

        // A build without a prior release still retires the old views.
        owned.replace(vec![view(6), view(7)], |v| destroyed.push(v));
        assert_eq!(destroyed, [1, 2, 3, 4, 5].map(view).to_vec());

        owned.release(|v| destroyed.push(v));
        owned.release(|v| destroyed.push(v));
        assert_eq!(destroyed, (1..=7).map(view).collect::<Vec<_>>());
        assert_eq!(owned.views.len(), 0);
    }

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_surface_format_prefers_srgb() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_UNORM),
            surface_format(vk::Format::R8G8B8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::B8G8R8A8_SRGB);

        let rgba_only = [
            surface_format(vk::Format::B8G8R8A8_UNORM),
            surface_format(vk::Format::R8G8B8A8_SRGB),
        ];
        assert_eq!(choose_surface_format(&rgba_only).format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn test_surface_format_fallback() {
        let formats = [surface_format(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_present_mode() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_follows_surface() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_extent_clamped_when_undefined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };
        let big = choose_extent(&capabilities, vk::Extent2D { width: 3000, height: 50 });
        assert_eq!((big.width, big.height), (2000, 100));
    }

    #[test]
    fn test_image_count_respects_buffering() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capped, 2), 3);
        assert_eq!(determine_image_count(&capped, 5), 3);

        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unbounded, 4), 4);
        assert_eq!(determine_image_count(&unbounded, 1), 3);
    }
}
