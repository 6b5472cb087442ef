//! Top-level renderer.
//!
//! Owns the Vulkan instance, surface and device, and drives a
//! [`FrameScheduler`] over a [`VulkanBackend`].
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle
//! 2. Drop the scheduler (per-frame resources, scene, pipelines, swapchain)
//! 3. Drop the device
//! 4. Drop the surface
//! 5. Drop the instance
//!
//! `ManuallyDrop` pins this order regardless of field declaration order.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use tessera_core::RendererConfig;
use tessera_platform::{Surface, Window};
use tessera_resources::SceneAsset;
use tessera_rhi::device::Device;
use tessera_rhi::instance::Instance;
use tessera_rhi::physical_device::select_physical_device;
use tessera_scene::{Camera, DrawList, DrawListBuilder, SceneLighting};

use crate::backend::VulkanBackend;
use crate::error::RendererResult;
use crate::recorder::{CommandRecorder, RecordStats};
use crate::scheduler::{FrameScheduler, FrameStatus};
use crate::targets::SurfaceRef;
use crate::ubo::FrameUniforms;

pub struct Renderer {
    scheduler: ManuallyDrop<FrameScheduler<VulkanBackend>>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,

    draw_lists: DrawListBuilder,
    draw_list: DrawList,
    clear_color: [f32; 4],
}

impl Renderer {
    /// Brings up Vulkan for `window` and uploads `scene`.
    pub fn new(window: &Window, config: &RendererConfig, scene: &SceneAsset) -> RendererResult<Self> {
        let extensions = window.required_extensions()?;
        let instance = Instance::new(&config.window_title, config.enable_validation, &extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;

        let backend = VulkanBackend::new(
            instance.handle(),
            device.clone(),
            SurfaceRef {
                handle: surface.handle(),
                loader: surface.loader().clone(),
            },
            window.extent(),
            config,
            scene,
        )?;
        let scheduler = FrameScheduler::new(backend, config.frames_in_flight());

        info!(
            "Renderer initialized: {} frame(s) in flight, {} mesh(es), {} material(s)",
            scheduler.frames_in_flight(),
            scene.meshes.len(),
            scene.materials.len()
        );

        Ok(Self {
            scheduler: ManuallyDrop::new(scheduler),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
            draw_lists: DrawListBuilder::default(),
            draw_list: DrawList::new(),
            clear_color: config.clear_color,
        })
    }

    /// Builds the draw list for `scene` as seen from `camera` and submits
    /// one frame.
    ///
    /// `scene` must be the asset this renderer was created with.
    pub fn render(
        &mut self,
        scene: &SceneAsset,
        camera: &Camera,
        lighting: &SceneLighting,
    ) -> RendererResult<FrameStatus> {
        if self.scheduler.is_minimized() {
            return Ok(FrameStatus::Suspended);
        }

        self.draw_lists
            .build(&scene.graph, camera.position, scene, &mut self.draw_list)?;

        let uniforms = FrameUniforms::from_camera(camera, lighting);
        let recorder = CommandRecorder::new(&scene.materials, self.clear_color);
        self.scheduler
            .draw_frame(&uniforms, &self.draw_list, &recorder)
    }

    /// Records a new window size. The swapchain is rebuilt at the start of
    /// the next frame, or deferred while the size is zero.
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        self.scheduler
            .backend_mut()
            .set_window_extent(vk::Extent2D { width, height });
        self.scheduler.notify_resized();
    }

    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.scheduler.is_minimized()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.scheduler.backend().targets().extent()
    }

    #[inline]
    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    #[inline]
    pub fn last_stats(&self) -> RecordStats {
        self.scheduler.last_stats()
    }

    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.scheduler.rebuild_count()
    }

    pub fn wait_idle(&mut self) -> RendererResult<()> {
        self.scheduler.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }

        // SAFETY: each field is dropped exactly once, here, and never used
        // afterwards. The scheduler holds the last device-owned objects and
        // the surface must go before the instance that created it.
        unsafe {
            ManuallyDrop::drop(&mut self.scheduler);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
