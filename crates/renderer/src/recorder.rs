//! Per-frame command stream emission.
//!
//! [`CommandRecorder`] turns a sorted [`DrawList`] into the fixed pass shape
//! the mesh shaders expect:
//!
//! ```text
//! begin pass (clear)
//! bind frame globals
//! bind opaque pipeline
//!   per opaque item: [set cull] [bind material] push constants, bind mesh, draw
//! bind blend pipeline
//!   per transparent item: [set cull] [bind material] push constants, bind mesh, draw
//! end pass
//! ```
//!
//! The material bind is skipped when an item shares the previous item's
//! material within the same pipeline phase. Single-sided materials cull back
//! faces, double-sided ones cull nothing; the cull mode is only set when it
//! differs from the last one set in the pass.
//!
//! Recording goes through [`CommandEncoder`] so the same recorder drives a
//! Vulkan command buffer or the in-memory [`RecordingEncoder`].

use tessera_resources::{Material, MaterialTable};
use tessera_rhi::pipeline::CullMode;
use tessera_scene::{DrawItem, DrawList, MeshId, SceneError};

use crate::error::RendererResult;
use crate::ubo::DrawConstants;

/// The two mesh pipelines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Depth write on, blending off.
    Opaque,
    /// Depth test only, alpha blending.
    Blend,
}

/// Sink for the recorder's command stream.
pub trait CommandEncoder {
    fn begin_pass(&mut self, clear_color: [f32; 4]);

    /// Binds set 0: camera matrices and lights.
    fn bind_frame_globals(&mut self);

    fn bind_pipeline(&mut self, pipeline: PipelineKind);

    fn set_cull_mode(&mut self, mode: CullMode);

    /// Binds set 1 for `material`.
    fn bind_material(&mut self, material: u32) -> RendererResult<()>;

    fn push_draw_constants(&mut self, constants: &DrawConstants);

    /// Binds the vertex and index buffers of `mesh` and returns its index
    /// count.
    fn bind_mesh(&mut self, mesh: MeshId) -> RendererResult<u32>;

    fn draw_indexed(&mut self, index_count: u32);

    fn end_pass(&mut self);
}

/// Counters for one recorded frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub draws: u32,
    pub material_binds: u32,
    pub skipped_material_binds: u32,
}

/// Face culling for `material`.
pub fn cull_mode_for(material: &Material) -> CullMode {
    if material.double_sided {
        CullMode::None
    } else {
        CullMode::Back
    }
}

/// Emits one frame's commands for a sorted draw list.
#[derive(Debug, Clone, Copy)]
pub struct CommandRecorder<'a> {
    materials: &'a MaterialTable,
    clear_color: [f32; 4],
}

impl<'a> CommandRecorder<'a> {
    pub fn new(materials: &'a MaterialTable, clear_color: [f32; 4]) -> Self {
        Self {
            materials,
            clear_color,
        }
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Records the pass for `list`. The transparent bucket must already be
    /// sorted back-to-front.
    pub fn record<E: CommandEncoder + ?Sized>(
        &self,
        encoder: &mut E,
        list: &DrawList,
    ) -> RendererResult<RecordStats> {
        let mut stats = RecordStats::default();
        // Dynamic state survives pipeline binds within the pass.
        let mut cull = None;

        encoder.begin_pass(self.clear_color);
        encoder.bind_frame_globals();

        encoder.bind_pipeline(PipelineKind::Opaque);
        self.record_phase(encoder, &list.opaque, &mut cull, &mut stats)?;

        encoder.bind_pipeline(PipelineKind::Blend);
        self.record_phase(encoder, &list.transparent, &mut cull, &mut stats)?;

        encoder.end_pass();
        Ok(stats)
    }

    fn record_phase<E: CommandEncoder + ?Sized>(
        &self,
        encoder: &mut E,
        items: &[DrawItem],
        cull: &mut Option<CullMode>,
        stats: &mut RecordStats,
    ) -> RendererResult<()> {
        let mut bound_material = None;

        for item in items {
            let material =
                self.materials
                    .get(item.material)
                    .ok_or(SceneError::MissingMaterial {
                        node: item.node,
                        mesh: item.mesh,
                        material: item.material,
                    })?;

            if bound_material == Some(item.material) {
                stats.skipped_material_binds += 1;
            } else {
                let mode = cull_mode_for(material);
                if *cull != Some(mode) {
                    encoder.set_cull_mode(mode);
                    *cull = Some(mode);
                }
                encoder.bind_material(item.material)?;
                bound_material = Some(item.material);
                stats.material_binds += 1;
            }

            encoder.push_draw_constants(&DrawConstants::new(item.model, material));
            let index_count = encoder.bind_mesh(item.mesh)?;
            encoder.draw_indexed(index_count);
            stats.draws += 1;
        }
        Ok(())
    }
}

/// A command captured by [`RecordingEncoder`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginPass { clear_color: [f32; 4] },
    BindFrameGlobals,
    BindPipeline(PipelineKind),
    SetCullMode(CullMode),
    BindMaterial(u32),
    PushConstants(DrawConstants),
    BindMesh(MeshId),
    DrawIndexed { index_count: u32 },
    EndPass,
}

/// Encoder that stores commands in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingEncoder {
    index_counts: Vec<u32>,
    commands: Vec<Command>,
}

impl RecordingEncoder {
    /// `index_counts[i]` is the index count of `MeshId(i)`; other ids are
    /// rejected like an unloaded mesh.
    pub fn new(index_counts: Vec<u32>) -> Self {
        Self {
            index_counts,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandEncoder for RecordingEncoder {
    fn begin_pass(&mut self, clear_color: [f32; 4]) {
        self.commands.push(Command::BeginPass { clear_color });
    }

    fn bind_frame_globals(&mut self) {
        self.commands.push(Command::BindFrameGlobals);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineKind) {
        self.commands.push(Command::BindPipeline(pipeline));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.commands.push(Command::SetCullMode(mode));
    }

    fn bind_material(&mut self, material: u32) -> RendererResult<()> {
        self.commands.push(Command::BindMaterial(material));
        Ok(())
    }

    fn push_draw_constants(&mut self, constants: &DrawConstants) {
        self.commands.push(Command::PushConstants(*constants));
    }

    fn bind_mesh(&mut self, mesh: MeshId) -> RendererResult<u32> {
        let index_count = *self
            .index_counts
            .get(mesh.index())
            .ok_or(SceneError::UnknownMesh(mesh))?;
        self.commands.push(Command::BindMesh(mesh));
        Ok(index_count)
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.commands.push(Command::DrawIndexed { index_count });
    }

    fn end_pass(&mut self) {
        self.commands.push(Command::EndPass);
    }
}
