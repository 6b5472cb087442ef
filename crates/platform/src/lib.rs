//! Platform layer: winit window, Vulkan surface and input state.

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window, required_extensions};

// Re-export winit types that users might need
pub use winit::event::{DeviceEvent, DeviceId, WindowEvent};
pub use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
pub use winit::window::WindowId;
