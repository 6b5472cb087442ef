//! Asset loading.
//!
//! - glTF scene import into a [`SceneAsset`]
//! - image decoding to RGBA8
//! - materials with default-texture fallback
//! - built-in demo scene

mod asset;
mod error;
pub mod gltf_loader;
pub mod image;
pub mod material;
pub mod mesh;

pub use asset::SceneAsset;
pub use error::{ResourceError, ResourceResult};
pub use gltf_loader::{load_gltf, load_gltf_slice};
pub use image::ImageData;
pub use material::{Material, MaterialTable, TextureChannel};
pub use mesh::{Aabb, MeshData};
