//! Vulkan implementation of [`FrameBackend`].

use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;
use tracing::{info, warn};

use tessera_core::RendererConfig;
use tessera_resources::SceneAsset;
use tessera_rhi::RhiError;
use tessera_rhi::command::{CommandBuffer, CommandPool};
use tessera_rhi::descriptor::{DescriptorAllocator, PoolRatio};
use tessera_rhi::device::Device;
use tessera_rhi::pipeline::CullMode;
use tessera_rhi::swapchain::{SwapchainAcquire, SwapchainPresent};
use tessera_scene::{MeshId, SceneError};

use crate::depth_buffer::{DEFAULT_DEPTH_FORMAT, DEPTH_CLEAR};
use crate::error::{RendererError, RendererResult};
use crate::frame::FrameRing;
use crate::frame_resources::FrameResources;
use crate::gpu_scene::GpuScene;
use crate::pipelines::{FRAME_SET, MATERIAL_SET, MeshPipelines, PUSH_CONSTANT_STAGES, SetLayouts};
use crate::recorder::{CommandEncoder, PipelineKind};
use crate::scheduler::FrameBackend;
use crate::targets::{SurfaceRef, SurfaceTargets, color_attachment_barrier, present_barrier};
use crate::ubo::{DrawConstants, FrameUniforms};

/// GPU resources behind the frame scheduler.
///
/// Fields are declared in drop order: per-frame resources, then the scene,
/// pipelines and layouts, then the size-dependent targets, then the command
/// pools their buffers came from.
pub struct VulkanBackend {
    frames: Vec<FrameResources>,
    _frame_descriptors: DescriptorAllocator,
    scene: GpuScene,
    pipelines: MeshPipelines,
    set_layouts: SetLayouts,
    targets: SurfaceTargets,
    _command_pool: CommandPool,
    _upload_pool: CommandPool,
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,
    window_extent: vk::Extent2D,
    device: Arc<Device>,
}

impl VulkanBackend {
    pub fn new(
        instance: &ash::Instance,
        device: Arc<Device>,
        surface: SurfaceRef,
        window_extent: vk::Extent2D,
        config: &RendererConfig,
        scene: &SceneAsset,
    ) -> RendererResult<Self> {
        let slots = FrameRing::new(config.frames_in_flight()).len();
        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let upload_pool = CommandPool::new_transient(device.clone(), graphics_family)?;

        let targets = SurfaceTargets::new(
            instance,
            device.clone(),
            surface,
            window_extent,
            slots as u32,
        )?;

        let vertex_shader = config.vertex_shader_path();
        let fragment_shader = config.fragment_shader_path();
        let set_layouts = SetLayouts::new(device.clone())?;
        let pipelines = MeshPipelines::new(
            device.clone(),
            &set_layouts,
            &vertex_shader,
            &fragment_shader,
            targets.color_format(),
            DEFAULT_DEPTH_FORMAT,
        )?;

        let gpu_scene = GpuScene::upload(
            device.clone(),
            &upload_pool,
            set_layouts.material.handle(),
            scene,
        )?;

        let mut frame_descriptors = DescriptorAllocator::new(
            device.clone(),
            slots as u32,
            &[PoolRatio {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                per_set: 1.0,
            }],
        )?;
        let frames = FrameResources::create_ring(
            &device,
            &command_pool,
            &mut frame_descriptors,
            set_layouts.frame.handle(),
            slots,
        )?;

        info!(
            "Vulkan backend ready: {} slot(s), {} swapchain image(s)",
            frames.len(),
            targets.swapchain().image_count()
        );

        Ok(Self {
            frames,
            _frame_descriptors: frame_descriptors,
            scene: gpu_scene,
            pipelines,
            set_layouts,
            targets,
            _command_pool: command_pool,
            _upload_pool: upload_pool,
            vertex_shader,
            fragment_shader,
            window_extent,
            device,
        })
    }

    /// Records the window's new drawable size. Takes effect at the next
    /// rebuild.
    pub fn set_window_extent(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
    }

    #[inline]
    pub fn targets(&self) -> &SurfaceTargets {
        &self.targets
    }

    #[inline]
    pub fn scene(&self) -> &GpuScene {
        &self.scene
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameBackend for VulkanBackend {
    fn surface_extent(&self) -> vk::Extent2D {
        self.window_extent
    }

    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.frames[slot].sync().in_flight.wait()?;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RendererResult<SwapchainAcquire> {
        let semaphore = self.frames[slot].sync().image_available.handle();
        Ok(self.targets.swapchain().acquire_next_image(semaphore)?)
    }

    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms) -> RendererResult<()> {
        self.frames[slot].write_uniforms(uniforms)?;
        Ok(())
    }

    fn record(
        &mut self,
        slot: usize,
        image_index: u32,
        commands: &mut dyn FnMut(&mut dyn CommandEncoder) -> RendererResult<()>,
    ) -> RendererResult<()> {
        let frame = &self.frames[slot];
        let cmd = frame.command_buffer();
        let swapchain = self.targets.swapchain();
        let color_image = swapchain.image(image_index as usize);

        cmd.reset()?;
        cmd.begin()?;
        cmd.image_barrier(color_attachment_barrier(color_image));
        cmd.image_barrier(self.targets.depth().begin_frame_barrier());

        let mut encoder = VulkanEncoder {
            cmd,
            pipelines: &self.pipelines,
            scene: &self.scene,
            frame_set: frame.frame_set(),
            color_view: swapchain.image_view(image_index as usize),
            depth_view: self.targets.depth().image_view(),
            extent: self.targets.extent(),
            in_pass: false,
        };
        let recorded = commands(&mut encoder);
        if encoder.in_pass {
            cmd.end_rendering();
        }

        cmd.image_barrier(present_barrier(color_image));
        cmd.end()?;
        recorded
    }

    fn submit(&mut self, slot: usize) -> RendererResult<()> {
        let frame = &self.frames[slot];
        let sync = frame.sync();
        sync.in_flight.reset()?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [frame.command_buffer().handle()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        self.device
            .submit_graphics(&[submit_info], sync.in_flight.handle())?;
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<SwapchainPresent> {
        let render_finished = self.frames[slot].sync().render_finished.handle();
        Ok(self.targets.swapchain().present(
            self.device.present_queue(),
            image_index,
            render_finished,
        )?)
    }

    fn wait_idle(&mut self) -> RendererResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }

    fn rebuild_swapchain(&mut self, extent: vk::Extent2D) -> RendererResult<()> {
        self.targets.rebuild(extent)?;
        if self.targets.color_format() != self.pipelines.color_format() {
            warn!(
                "Swapchain format changed {:?} -> {:?}, rebuilding pipelines",
                self.pipelines.color_format(),
                self.targets.color_format()
            );
            self.pipelines = MeshPipelines::new(
                self.device.clone(),
                &self.set_layouts,
                &self.vertex_shader,
                &self.fragment_shader,
                self.targets.color_format(),
                DEFAULT_DEPTH_FORMAT,
            )?;
        }
        Ok(())
    }
}

/// [`CommandEncoder`] over one slot's command buffer.
struct VulkanEncoder<'a> {
    cmd: &'a CommandBuffer,
    pipelines: &'a MeshPipelines,
    scene: &'a GpuScene,
    frame_set: vk::DescriptorSet,
    color_view: vk::ImageView,
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
    in_pass: bool,
}

impl CommandEncoder for VulkanEncoder<'_> {
    fn begin_pass(&mut self, clear_color: [f32; 4]) {
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            });
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: DEPTH_CLEAR,
                    stencil: 0,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        self.cmd.begin_rendering(&rendering_info);
        self.cmd.set_viewport_and_scissor(self.extent);
        self.in_pass = true;
    }

    fn bind_frame_globals(&mut self) {
        self.cmd
            .bind_descriptor_set(self.pipelines.layout(), FRAME_SET, self.frame_set);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineKind) {
        self.cmd
            .bind_graphics_pipeline(self.pipelines.pipeline(pipeline));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cmd.set_cull_mode(mode.to_vk());
    }

    fn bind_material(&mut self, material: u32) -> RendererResult<()> {
        let set = self
            .scene
            .material_set(material)
            .ok_or(RendererError::MissingMaterialSet(material))?;
        self.cmd
            .bind_descriptor_set(self.pipelines.layout(), MATERIAL_SET, set);
        Ok(())
    }

    fn push_draw_constants(&mut self, constants: &DrawConstants) {
        self.cmd.push_constants(
            self.pipelines.layout(),
            PUSH_CONSTANT_STAGES,
            constants.as_bytes(),
        );
    }

    fn bind_mesh(&mut self, mesh: MeshId) -> RendererResult<u32> {
        let gpu_mesh = self.scene.mesh(mesh).ok_or(SceneError::UnknownMesh(mesh))?;
        if let Some((vertices, indices)) = gpu_mesh.buffers() {
            self.cmd.bind_vertex_buffer(vertices);
            self.cmd.bind_index_buffer(indices);
        }
        Ok(gpu_mesh.index_count())
    }

    fn draw_indexed(&mut self, index_count: u32) {
        if index_count > 0 {
            self.cmd.draw_indexed(index_count);
        }
    }

    fn end_pass(&mut self) {
        self.cmd.end_rendering();
        self.in_pass = false;
    }
}
