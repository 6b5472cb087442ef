//! Mesh pipelines and their shared binding layout.
//!
//! | set | binding | contents |
//! |-----|---------|----------|
//! | 0   | 0       | [`FrameUniforms`](crate::FrameUniforms) |
//! | 1   | 0..=4   | material textures, one per [`TextureChannel`] |
//!
//! Per-draw data goes through a single push-constant range holding
//! [`DrawConstants`]. Cull mode is dynamic so double-sided materials can
//! share both pipelines.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use tessera_resources::TextureChannel;
use tessera_rhi::RhiResult;
use tessera_rhi::descriptor::{
    DescriptorSetLayout, combined_image_sampler_binding, uniform_buffer_binding,
};
use tessera_rhi::device::Device;
use tessera_rhi::pipeline::{BlendMode, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use tessera_rhi::shader::{Shader, ShaderStage};
use tessera_rhi::vertex::Vertex;

use crate::recorder::PipelineKind;
use crate::ubo::DrawConstants;

pub const FRAME_SET: u32 = 0;
pub const MATERIAL_SET: u32 = 1;

pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Descriptor set layouts for sets 0 and 1.
pub struct SetLayouts {
    pub frame: DescriptorSetLayout,
    pub material: DescriptorSetLayout,
}

impl SetLayouts {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let frame = DescriptorSetLayout::new(
            device.clone(),
            &[uniform_buffer_binding(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let material_bindings: Vec<_> = TextureChannel::ALL
            .iter()
            .map(|channel| {
                combined_image_sampler_binding(channel.binding(), vk::ShaderStageFlags::FRAGMENT)
            })
            .collect();
        let material = DescriptorSetLayout::new(device, &material_bindings)?;
        Ok(Self { frame, material })
    }
}

pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange::default()
        .stage_flags(PUSH_CONSTANT_STAGES)
        .offset(0)
        .size(DrawConstants::SIZE as u32)
}

/// Opaque and blend pipelines over one layout.
pub struct MeshPipelines {
    layout: PipelineLayout,
    opaque: Pipeline,
    blend: Pipeline,
    color_format: vk::Format,
}

impl MeshPipelines {
    pub fn new(
        device: Arc<Device>,
        sets: &SetLayouts,
        vertex_shader: &Path,
        fragment_shader: &Path,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let vertex = Shader::from_spirv_file(device.clone(), vertex_shader, ShaderStage::Vertex)?;
        let fragment =
            Shader::from_spirv_file(device.clone(), fragment_shader, ShaderStage::Fragment)?;

        let layout = PipelineLayout::new(
            device.clone(),
            &[sets.frame.handle(), sets.material.handle()],
            &[push_constant_range()],
        )?;

        let attributes = Vertex::attribute_descriptions();
        let base = || {
            GraphicsPipelineBuilder::new()
                .vertex_shader(&vertex)
                .fragment_shader(&fragment)
                .vertex_binding(Vertex::binding_description())
                .vertex_attributes(&attributes)
                .color_format(color_format)
                .depth_format(depth_format)
                .cull_mode(CullMode::Back)
                .dynamic_cull_mode(true)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_test(true)
        };

        let opaque = base()
            .depth_write(true)
            .blend(BlendMode::Opaque)
            .build(device.clone(), &layout)?;
        let blend = base()
            .depth_write(false)
            .blend(BlendMode::Alpha)
            .build(device, &layout)?;

        info!("Mesh pipelines created for {:?}", color_format);
        Ok(Self {
            layout,
            opaque,
            blend,
            color_format,
        })
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    pub fn pipeline(&self, kind: PipelineKind) -> vk::Pipeline {
        match kind {
            PipelineKind::Opaque => self.opaque.handle(),
            PipelineKind::Blend => self.blend.handle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_range_covers_draw_constants() {
        let range = push_constant_range();
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 96);
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::VERTEX));
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
    }
}
