//! Core utilities shared across the tessera crates.
//!
//! - Error type and result alias
//! - Logging initialization
//! - Frame timing
//! - Renderer configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{RendererConfig, SwapchainBuffering};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::{FrameTimer, MAX_FRAME_DELTA};
