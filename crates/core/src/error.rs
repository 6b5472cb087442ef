//! Error types shared by the application-facing crates.

use thiserror::Error;

/// Main error type for startup and platform code.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Shader error: {0}")]
    Shader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value failed validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The configuration file is not valid JSON for [`crate::RendererConfig`].
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
