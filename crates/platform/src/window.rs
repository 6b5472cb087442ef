//! Window and Vulkan surface creation on top of winit.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{CursorGrabMode, Window as WinitWindow, WindowAttributes};

use tessera_core::{Error, RendererConfig, Result};

/// Owning wrapper for a `vk::SurfaceKHR`.
///
/// The Vulkan instance that created the surface must outlive it.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader used to query capabilities, formats and present modes.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by ash_window::create_surface from the same instance
        // as the loader; destroyed only here.
        unsafe { self.loader.destroy_surface(self.handle, None) };
        debug!("Vulkan surface destroyed");
    }
}

/// Application window. Tracks the last reported framebuffer size so the
/// renderer can tell a minimized (zero-extent) surface apart.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    cursor_captured: bool,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, config: &RendererConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.window_title.as_str())
            .with_inner_size(PhysicalSize::new(config.window_width, config.window_height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;
        let size = window.inner_size();

        info!(
            "Window created: '{}' {}x{}",
            config.window_title, size.width, size.height
        );

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
            cursor_captured: false,
        })
    }

    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Current size as a Vulkan extent.
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    /// Records a resize event. Returns `true` if the size actually changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let changed = (self.width, self.height) != (width, height);
        self.width = width;
        self.height = height;
        if changed {
            debug!("Window resized: {}x{}", width, height);
        }
        changed
    }

    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, or 1.0 while minimized.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_minimized() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn is_cursor_captured(&self) -> bool {
        self.cursor_captured
    }

    /// Locks and hides the cursor for mouse-look, or releases it.
    pub fn set_cursor_captured(&mut self, captured: bool) {
        if captured {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                warn!("Cursor grab unavailable: {}", e);
            }
        } else if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            warn!("Failed to release cursor: {}", e);
        }
        self.window.set_cursor_visible(!captured);
        self.cursor_captured = captured;
        debug!("Mouse-look {}", if captured { "enabled" } else { "disabled" });
    }

    /// Instance extensions needed to create a surface for this window.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;
        required_extensions(display_handle.as_raw())
    }

    /// Creates a Vulkan surface for this window.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are live; the handles come from a live
        // winit window. Surface::drop destroys the surface.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };
        let loader = ash::khr::surface::Instance::new(entry, instance);

        info!("Vulkan surface created");
        Ok(Surface { handle, loader })
    }
}

/// Instance extensions needed to present to `display_handle`.
///
/// The returned pointers reference static strings owned by the loader.
pub fn required_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Vulkan(format!("Failed to enumerate surface extensions: {}", e)))?;

    debug!(
        "Surface extensions: {:?}",
        extensions
            .iter()
            // SAFETY: ash_window returns static, null-terminated names.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect::<Vec<_>>()
    );

    Ok(extensions.to_vec())
}
