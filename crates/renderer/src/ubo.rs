//! Shader-visible data blocks.
//!
//! These structures must match the GLSL declarations in `shaders/mesh.vert`
//! and `shaders/mesh.frag` exactly. All of them are `#[repr(C)]` and `Pod`
//! so they can be copied into mapped memory or push-constant ranges as bytes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use tessera_resources::Material;
use tessera_scene::{AlphaMode, Camera, DirectionalLight, SceneLighting};

/// Per-frame uniform block (descriptor set 0, binding 0, std140).
///
/// # Memory Layout
///
/// - Offset 0: view matrix (64 bytes)
/// - Offset 64: projection matrix (64 bytes)
/// - Offset 128: view-projection matrix (64 bytes)
/// - Offset 192: camera position + padding (16 bytes)
/// - Offset 208: directional light (32 bytes)
/// - Offset 240: ambient color premultiplied by intensity, w unused (16 bytes)
/// - Total size: 256 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    pub _padding: f32,
    pub light: DirectionalLight,
    pub ambient: Vec4,
}

impl FrameUniforms {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3, lighting: &SceneLighting) -> Self {
        Self {
            view,
            projection,
            view_projection: projection * view,
            camera_position,
            _padding: 0.0,
            light: lighting.sun,
            ambient: (lighting.ambient_color * lighting.ambient_intensity).extend(1.0),
        }
    }

    pub fn from_camera(camera: &Camera, lighting: &SceneLighting) -> Self {
        Self::new(
            camera.view_matrix(),
            camera.projection_matrix(),
            camera.position,
            lighting,
        )
    }
}

/// Per-draw push constants, visible to both shader stages.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: base color factor (16 bytes)
/// - Offset 80: metallic, roughness, alpha cutoff (12 bytes)
/// - Offset 92: alpha mode as `u32` (4 bytes)
/// - Total size: 96 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawConstants {
    pub model: Mat4,
    pub base_color_factor: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: u32,
}

impl DrawConstants {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Guaranteed minimum `maxPushConstantsSize`.
    pub const MAX_SIZE: usize = 128;

    pub fn new(model: Mat4, material: &Material) -> Self {
        Self {
            model,
            base_color_factor: material.base_color_factor,
            metallic: material.metallic_factor,
            roughness: material.roughness_factor,
            alpha_cutoff: material.alpha_cutoff,
            alpha_mode: alpha_mode_code(material.alpha_mode),
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Value of `alpha_mode` in [`DrawConstants`]: 0 opaque, 1 mask, 2 blend.
pub fn alpha_mode_code(mode: AlphaMode) -> u32 {
    match mode {
        AlphaMode::Opaque => 0,
        AlphaMode::Mask => 1,
        AlphaMode::Blend => 2,
    }
}
