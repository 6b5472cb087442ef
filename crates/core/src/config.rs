//! Renderer configuration.
//!
//! Configuration is a flat JSON document; every field is optional and falls
//! back to [`RendererConfig::default`].
//!
//! ```json
//! {
//!     "window_title": "Sponza",
//!     "buffering": "Triple",
//!     "model_path": "assets/Sponza.glb",
//!     "clear_color": [0.0, 0.0, 0.0, 1.0]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of frames the host may record ahead of the GPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapchainBuffering {
    Single,
    #[default]
    Double,
    Triple,
}

impl SwapchainBuffering {
    /// Frames in flight, and the number of per-frame resource sets.
    #[inline]
    pub fn depth(self) -> usize {
        match self {
            SwapchainBuffering::Single => 1,
            SwapchainBuffering::Double => 2,
            SwapchainBuffering::Triple => 3,
        }
    }

    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            1 => Some(SwapchainBuffering::Single),
            2 => Some(SwapchainBuffering::Double),
            3 => Some(SwapchainBuffering::Triple),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub buffering: SwapchainBuffering,
    /// Linear RGBA color the frame is cleared to.
    pub clear_color: [f32; 4],
    /// glTF asset to load; `None` renders the built-in demo scene.
    pub model_path: Option<PathBuf>,
    /// Directory containing `mesh.vert.spv` and `mesh.frag.spv`.
    pub shader_dir: PathBuf,
    pub enable_validation: bool,
    /// Camera movement in world units per second.
    pub camera_speed: f32,
    /// Degrees of rotation per pixel of mouse motion.
    pub mouse_sensitivity: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_title: "Tessera".to_string(),
            window_width: 1280,
            window_height: 720,
            buffering: SwapchainBuffering::Double,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            model_path: None,
            shader_dir: PathBuf::from("shaders"),
            enable_validation: cfg!(debug_assertions),
            camera_speed: 2.5,
            mouse_sensitivity: 0.1,
        }
    }
}

impl RendererConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a config from command-line arguments (program name excluded).
    ///
    /// A single `.json` argument is read as a config file; any other argument
    /// is taken as the model path on top of the defaults.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let config = match args.next() {
            None => Self::default(),
            Some(arg) if arg.ends_with(".json") => Self::load(&arg)?,
            Some(arg) => Self {
                model_path: Some(PathBuf::from(arg)),
                ..Self::default()
            },
        };

        if let Some(extra) = args.next() {
            return Err(Error::Config(format!("unexpected argument '{}'", extra)));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        if !(self.camera_speed.is_finite() && self.camera_speed > 0.0) {
            return Err(Error::Config(format!(
                "camera_speed must be positive, got {}",
                self.camera_speed
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.buffering.depth()
    }

    pub fn vertex_shader_path(&self) -> PathBuf {
        self.shader_dir.join("mesh.vert.spv")
    }

    pub fn fragment_shader_path(&self) -> PathBuf {
        self.shader_dir.join("mesh.frag.spv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight(), 2);
        assert_eq!(config.clear_color, [0.1, 0.1, 0.15, 1.0]);
        assert!(config.model_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            RendererConfig::from_json(r#"{ "buffering": "Triple", "window_width": 800 }"#)
                .unwrap();
        assert_eq!(config.frames_in_flight(), 3);
        assert_eq!(config.window_width, 800);
        assert_eq!(config.window_height, 720);
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = RendererConfig::from_json(r#"{ "window_height": 0 }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = RendererConfig::from_json("{ buffering: ");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_args_model_path() {
        let config = RendererConfig::from_args(["assets/box.glb"]).unwrap();
        assert_eq!(config.model_path, Some(PathBuf::from("assets/box.glb")));

        let none = RendererConfig::from_args(Vec::<String>::new()).unwrap();
        assert!(none.model_path.is_none());

        assert!(RendererConfig::from_args(["a.glb", "b.glb"]).is_err());
    }

    #[test]
    fn test_buffering_depth_roundtrip() {
        for depth in 1..=3 {
            let buffering = SwapchainBuffering::from_depth(depth).unwrap();
            assert_eq!(buffering.depth(), depth);
        }
        assert!(SwapchainBuffering::from_depth(4).is_none());
    }

    #[test]
    fn test_shader_paths() {
        let config = RendererConfig::default();
        assert_eq!(
            config.vertex_shader_path(),
            PathBuf::from("shaders").join("mesh.vert.spv")
        );
    }
}
