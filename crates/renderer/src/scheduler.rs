//! Frame scheduling: acquire, record, submit and present over a ring of
//! frame slots.
//!
//! # Per-frame cycle
//!
//! ```text
//! 1. wait on the current slot's fence      (the only steady-state block)
//! 2. acquire a presentable image           (index independent of the slot)
//! 3. write the slot's uniforms, record     (slot: Idle -> Recording)
//! 4. submit: wait image-available,         (slot: Recording -> Submitted)
//!    signal render-finished, re-arm fence
//! 5. present, advance ring (i + 1) mod N
//! ```
//!
//! A swapchain rebuild drains the GPU, rebuilds every size-dependent target
//! and resumes with the ring index untouched. It runs when a resize was
//! notified, when acquire reports the chain out of date (the frame is
//! dropped), or after present when acquire or present reported it stale.
//!
//! The scheduler is generic over [`FrameBackend`] so it can be driven by a
//! fake GPU in tests.

use ash::vk;
use tracing::{debug, info, trace};

use tessera_rhi::swapchain::{SwapchainAcquire, SwapchainPresent};
use tessera_scene::DrawList;

use crate::error::RendererResult;
use crate::frame::FrameRing;
use crate::recorder::{CommandEncoder, CommandRecorder, RecordStats};
use crate::ubo::FrameUniforms;

/// GPU-side operations the scheduler sequences. `slot` is always a ring
/// index in `0..N`.
pub trait FrameBackend {
    /// Current drawable size of the surface. Zero while minimized.
    fn surface_extent(&self) -> vk::Extent2D;

    /// Blocks until the slot's last submission has completed.
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()>;

    /// Requests the next presentable image, signaling the slot's
    /// image-available semaphore.
    fn acquire_image(&mut self, slot: usize) -> RendererResult<SwapchainAcquire>;

    /// Copies `uniforms` into the slot's host-mapped uniform buffer.
    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms) -> RendererResult<()>;

    /// Resets and begins the slot's command buffer, lets `commands` fill it
    /// against `image_index`, then ends it.
    fn record(
        &mut self,
        slot: usize,
        image_index: u32,
        commands: &mut dyn FnMut(&mut dyn CommandEncoder) -> RendererResult<()>,
    ) -> RendererResult<()>;

    /// Resets the slot's fence and submits its command buffer.
    fn submit(&mut self, slot: usize) -> RendererResult<()>;

    /// Queues `image_index` for presentation once the slot's
    /// render-finished semaphore is signaled.
    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<SwapchainPresent>;

    /// Blocks until the device has finished all submitted work.
    fn wait_idle(&mut self) -> RendererResult<()>;

    /// Destroys and recreates the swapchain and every size-dependent
    /// attachment. Called only after [`wait_idle`](Self::wait_idle).
    fn rebuild_swapchain(&mut self, extent: vk::Extent2D) -> RendererResult<()>;
}

/// Outcome of one [`FrameScheduler::draw_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was presented and the swapchain is current.
    Presented,
    /// The surface has zero extent; nothing was done.
    Suspended,
    /// The swapchain was rebuilt during this call. The frame was presented
    /// unless acquire reported the old chain out of date.
    SwapchainRebuilt,
}

/// Drives a [`FrameBackend`] through the per-frame cycle.
///
/// At most `frames_in_flight` submissions are outstanding: frame `k` reuses
/// slot `k mod N` and waits for frame `k - N` to finish before touching it.
///
/// # Example
///
/// ```no_run
/// use tessera_renderer::{CommandRecorder, FrameBackend, FrameScheduler, FrameStatus, FrameUniforms};
/// use tessera_resources::MaterialTable;
/// use tessera_scene::DrawList;
///
/// # fn example<B: FrameBackend>(backend: B) -> tessera_renderer::RendererResult<()> {
/// let mut scheduler = FrameScheduler::new(backend, 2);
/// let materials = MaterialTable::default();
/// let recorder = CommandRecorder::new(&materials, [0.0, 0.0, 0.0, 1.0]);
///
/// match scheduler.draw_frame(&FrameUniforms::default(), &DrawList::new(), &recorder)? {
///     FrameStatus::Suspended => { /* minimized: skip until resized */ }
///     FrameStatus::SwapchainRebuilt => { /* update the camera aspect */ }
///     FrameStatus::Presented => {}
/// }
/// scheduler.wait_idle()?;
/// # Ok(())
/// # }
/// ```
pub struct FrameScheduler<B: FrameBackend> {
    backend: B,
    ring: FrameRing,
    resize_pending: bool,
    rebuilds: u64,
    last_stats: RecordStats,
}

impl<B: FrameBackend> FrameScheduler<B> {
    /// Creates a scheduler with `frames_in_flight` ring slots. The backend
    /// must own at least that many per-frame resource sets.
    pub fn new(backend: B, frames_in_flight: usize) -> Self {
        let ring = FrameRing::new(frames_in_flight);
        info!("Frame scheduler created with {} frame(s) in flight", ring.len());
        Self {
            backend,
            ring,
            resize_pending: false,
            rebuilds: 0,
            last_stats: RecordStats::default(),
        }
    }

    /// The backend, for queries such as the current swapchain extent.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access. Do not submit work through it between
    /// frames; the scheduler's slot states would no longer match the GPU.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Slot states and the current ring index.
    #[inline]
    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.ring.len()
    }

    /// Number of swapchain rebuilds so far.
    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Whether a rebuild is queued, either notified or deferred by a zero
    /// extent.
    #[inline]
    pub fn is_resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Counters from the last recorded frame.
    #[inline]
    pub fn last_stats(&self) -> RecordStats {
        self.last_stats
    }

    /// Requests a swapchain rebuild before the next frame.
    pub fn notify_resized(&mut self) {
        debug!("Resize notified, swapchain rebuild pending");
        self.resize_pending = true;
    }

    /// Whether the surface currently has zero extent.
    pub fn is_minimized(&self) -> bool {
        is_zero(self.backend.surface_extent())
    }

    /// Runs one frame cycle for `list`.
    ///
    /// `uniforms` is written to the slot only after its fence wait, so the
    /// GPU never reads a buffer the host is writing.
    ///
    /// # Arguments
    ///
    /// * `uniforms` - Camera matrices and lights for this frame
    /// * `list` - Sorted draw list; the transparent bucket back-to-front
    /// * `recorder` - Emits the pass for `list` into the slot's encoder
    ///
    /// # Errors
    ///
    /// Any backend failure is returned as-is. A failed recording leaves
    /// the slot idle with nothing submitted, so the next call reuses it.
    /// Errors from submit or present are fatal for the device in practice;
    /// callers should stop rendering. Out-of-date and suboptimal swapchains
    /// are not errors: they trigger a rebuild and are reported through
    /// [`FrameStatus`].
    pub fn draw_frame(
        &mut self,
        uniforms: &FrameUniforms,
        list: &DrawList,
        recorder: &CommandRecorder<'_>,
    ) -> RendererResult<FrameStatus> {
        if self.is_minimized() {
            trace!("Surface has zero extent, frame suspended");
            return Ok(FrameStatus::Suspended);
        }

        let mut rebuilt = false;
        if self.resize_pending {
            rebuilt = self.rebuild()?;
        }

        let slot = self.ring.current();
        self.backend.wait_for_slot(slot)?;
        self.ring.mark_idle();

        let (image_index, acquire_suboptimal) = match self.backend.acquire_image(slot)? {
            SwapchainAcquire::Image { index, suboptimal } => (index, suboptimal),
            SwapchainAcquire::OutOfDate => {
                debug!(slot, "Swapchain out of date on acquire, frame dropped");
                return Ok(if self.rebuild()? {
                    FrameStatus::SwapchainRebuilt
                } else {
                    FrameStatus::Suspended
                });
            }
        };
        trace!(slot, image_index, "Acquired swapchain image");

        self.backend.write_uniforms(slot, uniforms)?;

        self.ring.mark_recording();
        let mut stats = RecordStats::default();
        let mut commands = |encoder: &mut dyn CommandEncoder| -> RendererResult<()> {
            stats = recorder.record(encoder, list)?;
            Ok(())
        };
        let recorded = self.backend.record(slot, image_index, &mut commands);
        if let Err(e) = recorded {
            self.ring.abandon_recording();
            return Err(e);
        }
        self.last_stats = stats;

        self.backend.submit(slot)?;
        self.ring.mark_submitted();

        let present = self.backend.present(slot, image_index)?;
        self.ring.advance();

        if acquire_suboptimal || present != SwapchainPresent::Optimal {
            debug!(
                acquire_suboptimal,
                ?present,
                "Swapchain stale after present, rebuilding"
            );
            rebuilt |= self.rebuild()?;
        }

        Ok(if rebuilt {
            FrameStatus::SwapchainRebuilt
        } else {
            FrameStatus::Presented
        })
    }

    /// Drains every in-flight submission and marks all slots idle.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the device wait fails; slot states
    /// are left unchanged in that case.
    pub fn wait_idle(&mut self) -> RendererResult<()> {
        self.backend.wait_idle()?;
        self.ring.mark_all_idle();
        Ok(())
    }

    /// Rebuilds for the current surface extent. A zero extent defers the
    /// rebuild until the surface is restored.
    fn rebuild(&mut self) -> RendererResult<bool> {
        let extent = self.backend.surface_extent();
        if is_zero(extent) {
            debug!("Surface has zero extent, swapchain rebuild deferred");
            self.resize_pending = true;
            return Ok(false);
        }

        self.wait_idle()?;
        self.backend.rebuild_swapchain(extent)?;
        self.resize_pending = false;
        self.rebuilds += 1;
        info!(
            "Swapchain rebuilt for {}x{} (rebuild #{})",
            extent.width, extent.height, self.rebuilds
        );
        Ok(true)
    }
}

#[inline]
fn is_zero(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}
