//! Error types for resource loading.

use std::path::PathBuf;

use tessera_scene::SceneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to load glTF '{path}': {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Pixel layout the RGBA8 converter does not handle.
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Index accessor with a component type other than u8, u16 or u32.
    #[error("Mesh '{mesh}' uses unsupported index component type {data_type}")]
    UnsupportedIndexFormat { mesh: String, data_type: String },

    #[error("Mesh '{mesh}' primitive is missing the {attribute} attribute")]
    MissingAttribute {
        mesh: String,
        attribute: &'static str,
    },

    #[error("Scene construction failed: {0}")]
    Scene(#[from] SceneError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ResourceResult<T> = Result<T, ResourceError>;
