//! GPU-resident copy of a [`SceneAsset`]: mesh buffers, textures and one
//! material descriptor set per material.
//!
//! Everything here is created once at scene load and destroyed with the
//! scene. Buffers and images release their device memory in `Drop` before
//! the host-side vectors holding them are freed.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use tessera_resources::{ImageData, MaterialTable, MeshData, SceneAsset, TextureChannel};
use tessera_rhi::RhiResult;
use tessera_rhi::buffer::{Buffer, BufferUsage};
use tessera_rhi::command::CommandPool;
use tessera_rhi::descriptor::{DescriptorAllocator, PoolRatio, write_combined_image_sampler};
use tessera_rhi::device::Device;
use tessera_rhi::texture::{Texture, TextureFormat};
use tessera_scene::MeshId;

/// Vertex and index buffers of one mesh. Empty meshes own no buffers.
pub struct GpuMesh {
    buffers: Option<(Buffer, Buffer)>,
    index_count: u32,
    material: u32,
}

impl GpuMesh {
    fn upload(device: &Arc<Device>, pool: &CommandPool, mesh: &MeshData) -> RhiResult<Self> {
        let buffers = if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            warn!("Mesh '{}' has no geometry and will not be drawn", mesh.name);
            None
        } else {
            let vertices = Buffer::new_device_local(
                device.clone(),
                pool,
                BufferUsage::Vertex,
                bytemuck::cast_slice(&mesh.vertices),
            )?;
            let indices = Buffer::new_device_local(
                device.clone(),
                pool,
                BufferUsage::Index,
                bytemuck::cast_slice(&mesh.indices),
            )?;
            Some((vertices, indices))
        };
        Ok(Self {
            buffers,
            index_count: mesh.indices.len() as u32,
            material: mesh.material,
        })
    }

    /// `(vertex buffer, index buffer)`, or `None` for an empty mesh.
    pub fn buffers(&self) -> Option<(vk::Buffer, vk::Buffer)> {
        self.buffers
            .as_ref()
            .map(|(vertices, indices)| (vertices.handle(), indices.handle()))
    }

    /// Indices to draw; zero for an empty mesh.
    #[inline]
    pub fn index_count(&self) -> u32 {
        if self.buffers.is_some() {
            self.index_count
        } else {
            0
        }
    }

    #[inline]
    pub fn material(&self) -> u32 {
        self.material
    }
}

pub struct GpuScene {
    meshes: Vec<GpuMesh>,
    textures: Vec<Texture>,
    default_texture: Texture,
    material_sets: Vec<vk::DescriptorSet>,
    // Sets are freed with their pools.
    _descriptors: DescriptorAllocator,
}

impl GpuScene {
    /// Uploads `asset` and writes a descriptor set of `material_layout` for
    /// every material. Blocks until all transfers have completed.
    pub fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        material_layout: vk::DescriptorSetLayout,
        asset: &SceneAsset,
    ) -> RhiResult<Self> {
        let meshes = asset
            .meshes
            .iter()
            .map(|mesh| GpuMesh::upload(&device, pool, mesh))
            .collect::<RhiResult<Vec<_>>>()?;

        let textures = asset
            .textures
            .iter()
            .map(|image| upload_image(&device, pool, image))
            .collect::<RhiResult<Vec<_>>>()?;
        let default_texture = Texture::white(device.clone(), pool)?;

        let mut descriptors = DescriptorAllocator::new(
            device.clone(),
            asset.materials.len().max(1) as u32,
            &[PoolRatio {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                per_set: TextureChannel::COUNT as f32,
            }],
        )?;

        let material_sets = write_material_sets(
            &device,
            &mut descriptors,
            material_layout,
            &asset.materials,
            |index| texture_or_default(&textures, &default_texture, index),
        )?;

        info!(
            "GPU scene uploaded: {} mesh(es), {} texture(s), {} material(s)",
            meshes.len(),
            textures.len(),
            material_sets.len()
        );
        Ok(Self {
            meshes,
            textures,
            default_texture,
            material_sets,
            _descriptors: descriptors,
        })
    }

    /// Texture `index`, or the default white texture when out of range.
    pub fn texture(&self, index: u32) -> &Texture {
        texture_or_default(&self.textures, &self.default_texture, index)
    }

    #[inline]
    pub fn mesh(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(id.index())
    }

    #[inline]
    pub fn material_set(&self, material: u32) -> Option<vk::DescriptorSet> {
        self.material_sets.get(material as usize).copied()
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

fn texture_or_default<'a>(textures: &'a [Texture], default: &'a Texture, index: u32) -> &'a Texture {
    textures.get(index as usize).unwrap_or(default)
}

fn write_material_sets<'t>(
    device: &Device,
    descriptors: &mut DescriptorAllocator,
    layout: vk::DescriptorSetLayout,
    materials: &MaterialTable,
    texture_for: impl Fn(u32) -> &'t Texture,
) -> RhiResult<Vec<vk::DescriptorSet>> {
    let mut sets = Vec::with_capacity(materials.len());
    for (index, material) in materials.iter().enumerate() {
        let set = descriptors.allocate(layout)?;
        for channel in TextureChannel::ALL {
            let texture = texture_for(materials.resolve_texture(material, channel));
            write_combined_image_sampler(
                device,
                set,
                channel.binding(),
                texture.view(),
                texture.sampler(),
            );
        }
        debug!("Material {} ('{}') descriptor set written", index, material.name);
        sets.push(set);
    }
    Ok(sets)
}

fn upload_image(device: &Arc<Device>, pool: &CommandPool, image: &ImageData) -> RhiResult<Texture> {
    let format = if image.srgb {
        TextureFormat::Srgb
    } else {
        TextureFormat::Linear
    };
    Texture::from_rgba8(
        device.clone(),
        pool,
        image.width,
        image.height,
        &image.pixels,
        format,
    )
}
