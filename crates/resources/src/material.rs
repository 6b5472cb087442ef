//! Materials and the material table.

use glam::{Vec3, Vec4};
use tessera_scene::AlphaMode;

/// Texture slots a material can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureChannel {
    BaseColor = 0,
    MetallicRoughness = 1,
    Normal = 2,
    Occlusion = 3,
    Emissive = 4,
}

impl TextureChannel {
    pub const COUNT: usize = 5;

    pub const ALL: [TextureChannel; Self::COUNT] = [
        TextureChannel::BaseColor,
        TextureChannel::MetallicRoughness,
        TextureChannel::Normal,
        TextureChannel::Occlusion,
        TextureChannel::Emissive,
    ];

    /// Whether texels hold color (sRGB) rather than data.
    pub fn is_srgb(self) -> bool {
        matches!(self, TextureChannel::BaseColor | TextureChannel::Emissive)
    }

    /// Descriptor binding within the per-material set.
    pub fn binding(self) -> u32 {
        self as u32
    }
}

/// Metallic-roughness PBR material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: Vec3,
    /// Texture index per [`TextureChannel`], into the scene's texture list.
    pub textures: [Option<u32>; TextureChannel::COUNT],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color_factor: Vec4::ONE,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: Vec3::ZERO,
            textures: [None; TextureChannel::COUNT],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

impl Material {
    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color_factor = color;
        self
    }

    pub fn with_alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.alpha_mode = mode;
        self
    }

    pub fn with_texture(mut self, channel: TextureChannel, texture: u32) -> Self {
        self.textures[channel as usize] = Some(texture);
        self
    }

    pub fn texture(&self, channel: TextureChannel) -> Option<u32> {
        self.textures[channel as usize]
    }

    pub fn base_alpha(&self) -> f32 {
        self.base_color_factor.w
    }
}

/// Materials of one scene plus the texture fallback rule.
///
/// Texture indices address a list of `texture_count` loaded textures. The
/// default texture (1x1 white) sits at index `texture_count`, so any
/// absent or out-of-range channel resolves to it.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    texture_count: u32,
}

impl MaterialTable {
    pub fn new(materials: Vec<Material>, texture_count: u32) -> Self {
        Self {
            materials,
            texture_count,
        }
    }

    pub fn get(&self, index: u32) -> Option<&Material> {
        self.materials.get(index as usize)
    }

    pub fn push(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }

    #[inline]
    pub fn default_texture_index(&self) -> u32 {
        self.texture_count
    }

    /// Texture bound to `channel` of `material`, falling back to the default
    /// texture when the channel is empty or its index is out of range.
    pub fn resolve_texture(&self, material: &Material, channel: TextureChannel) -> u32 {
        match material.texture(channel) {
            Some(index) if index < self.texture_count => index,
            _ => self.default_texture_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material_is_opaque_white() {
        let material = Material::default();
        assert_eq!(material.base_color_factor, Vec4::ONE);
        assert_eq!(material.alpha_mode, AlphaMode::Opaque);
        assert_eq!(material.alpha_cutoff, 0.5);
    }

    #[test]
    fn test_resolve_texture_fallback() {
        let table = MaterialTable::new(vec![], 2);
        let material = Material::default()
            .with_texture(TextureChannel::BaseColor, 1)
            .with_texture(TextureChannel::Normal, 7);

        assert_eq!(table.resolve_texture(&material, TextureChannel::BaseColor), 1);
        // Out of range.
        assert_eq!(table.resolve_texture(&material, TextureChannel::Normal), 2);
        // Absent.
        assert_eq!(table.resolve_texture(&material, TextureChannel::Emissive), 2);
        assert_eq!(table.default_texture_index(), 2);
    }

    #[test]
    fn test_channel_bindings_and_color_space() {
        for (i, channel) in TextureChannel::ALL.iter().enumerate() {
            assert_eq!(channel.binding(), i as u32);
        }
        assert!(TextureChannel::BaseColor.is_srgb());
        assert!(TextureChannel::Emissive.is_srgb());
        assert!(!TextureChannel::Normal.is_srgb());
    }
}
