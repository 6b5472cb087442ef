//! Image decoding to tightly packed RGBA8.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Decoded RGBA8 pixels plus the color space they are sampled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub srgb: bool,
}

impl ImageData {
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
            srgb: true,
        }
    }

    /// Decodes an encoded image (PNG, JPEG) from memory.
    pub fn decode(bytes: &[u8]) -> ResourceResult<Self> {
        let rgba = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
            srgb: true,
        })
    }

    pub fn load(path: &Path) -> ResourceResult<Self> {
        let rgba = image::open(path)?.into_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("Decoded {:?}: {}x{}", path, width, height);
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
            srgb: true,
        })
    }

    /// Converts pixel data already decoded by the glTF importer.
    pub fn from_gltf(data: gltf::image::Data) -> ResourceResult<Self> {
        let pixels = to_rgba8(data.format, &data.pixels)?;
        Ok(Self {
            width: data.width,
            height: data.height,
            pixels,
            srgb: true,
        })
    }
}

fn to_rgba8(format: gltf::image::Format, src: &[u8]) -> ResourceResult<Vec<u8>> {
    use gltf::image::Format;

    // 16-bit channels keep their high byte; float channels are clamped.
    let u16_hi = |c: &[u8]| c[1];
    let f32_u8 = |c: &[u8]| {
        let value = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
    };

    let pixels = match format {
        Format::R8G8B8A8 => src.to_vec(),
        Format::R8G8B8 => src
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => src
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8 => src.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        Format::R16G16B16A16 => src
            .chunks_exact(8)
            .flat_map(|p| {
                [
                    u16_hi(&p[0..2]),
                    u16_hi(&p[2..4]),
                    u16_hi(&p[4..6]),
                    u16_hi(&p[6..8]),
                ]
            })
            .collect(),
        Format::R16G16B16 => src
            .chunks_exact(6)
            .flat_map(|p| [u16_hi(&p[0..2]), u16_hi(&p[2..4]), u16_hi(&p[4..6]), 255])
            .collect(),
        Format::R16G16 => src
            .chunks_exact(4)
            .flat_map(|p| [u16_hi(&p[0..2]), u16_hi(&p[2..4]), 0, 255])
            .collect(),
        Format::R16 => src
            .chunks_exact(2)
            .flat_map(|p| {
                let r = u16_hi(p);
                [r, r, r, 255]
            })
            .collect(),
        Format::R32G32B32FLOAT => src
            .chunks_exact(12)
            .flat_map(|p| [f32_u8(&p[0..4]), f32_u8(&p[4..8]), f32_u8(&p[8..12]), 255])
            .collect(),
        Format::R32G32B32A32FLOAT => src
            .chunks_exact(16)
            .flat_map(|p| {
                [
                    f32_u8(&p[0..4]),
                    f32_u8(&p[4..8]),
                    f32_u8(&p[8..12]),
                    f32_u8(&p[12..16]),
                ]
            })
            .collect(),
        #[allow(unreachable_patterns)]
        other => {
            return Err(ResourceError::UnsupportedImageFormat(format!("{:?}", other)));
        }
    };
    Ok(pixels)
}
