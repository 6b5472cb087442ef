//! Sampled RGBA8 textures.
//!
//! Pixels are uploaded through a staging buffer and a one-time command
//! buffer: `UNDEFINED -> TRANSFER_DST -> SHADER_READ_ONLY`.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandPool, submit_one_time};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{GpuImage, layout_transition};

/// Color space of texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// Color data (base color, emissive).
    Srgb,
    /// Non-color data (normals, metallic-roughness, occlusion).
    Linear,
}

impl TextureFormat {
    pub fn to_vk(self) -> vk::Format {
        match self {
            TextureFormat::Srgb => vk::Format::R8G8B8A8_SRGB,
            TextureFormat::Linear => vk::Format::R8G8B8A8_UNORM,
        }
    }
}

pub struct Texture {
    image: GpuImage,
    sampler: vk::Sampler,
    device: Arc<Device>,
}

impl Texture {
    /// Uploads tightly packed RGBA8 `pixels` of `width` x `height`.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
        format: TextureFormat,
    ) -> RhiResult<Self> {
        let expected = rgba8_len(width, height);
        if pixels.len() != expected {
            return Err(RhiError::TextureError(format!(
                "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                pixels.len()
            )));
        }

        let extent = vk::Extent2D { width, height };
        let image = GpuImage::new(
            device.clone(),
            "texture",
            extent,
            format.to_vk(),
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;
        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        submit_one_time(&device, pool, |cmd| {
            cmd.image_barrier(layout_transition(
                image.image(),
                vk::ImageAspectFlags::COLOR,
                (
                    vk::ImageLayout::UNDEFINED,
                    vk::PipelineStageFlags2::TOP_OF_PIPE,
                    vk::AccessFlags2::NONE,
                ),
                (
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                ),
            ));
            cmd.copy_buffer_to_image(staging.handle(), image.image(), extent);
            cmd.image_barrier(layout_transition(
                image.image(),
                vk::ImageAspectFlags::COLOR,
                (
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::PipelineStageFlags2::TRANSFER,
                    vk::AccessFlags2::TRANSFER_WRITE,
                ),
                (
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::PipelineStageFlags2::FRAGMENT_SHADER,
                    vk::AccessFlags2::SHADER_SAMPLED_READ,
                ),
            ));
        })?;

        let sampler = create_sampler(&device)?;
        debug!("Uploaded {}x{} texture ({:?})", width, height, format);

        Ok(Self {
            image,
            sampler,
            device,
        })
    }

    /// 1x1 opaque white texture used when a material has no texture bound.
    pub fn white(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        Self::from_rgba8(device, pool, 1, 1, &[255, 255, 255, 255], TextureFormat::Srgb)
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_sampler(self.sampler, None) };
    }
}

fn create_sampler(device: &Device) -> RhiResult<vk::Sampler> {
    let mut info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .max_lod(vk::LOD_CLAMP_NONE);
    if let Some(max_anisotropy) = device.max_anisotropy() {
        info = info.anisotropy_enable(true).max_anisotropy(max_anisotropy);
    }
    Ok(unsafe { device.handle().create_sampler(&info, None)? })
}

#[inline]
pub fn rgba8_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}
