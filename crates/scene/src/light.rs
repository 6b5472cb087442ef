//! Scene lighting: one directional light plus an ambient term.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Sun-like light. Laid out for direct upload into a std140 block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DirectionalLight {
    /// Direction the light travels (normalized).
    pub direction: Vec3,
    pub intensity: f32,
    pub color: Vec3,
    pub _pad0: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(-0.4, -1.0, -0.3), Vec3::ONE, 1.0)
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Y),
            intensity,
            color,
            _pad0: 0.0,
        }
    }
}

/// Light state shared by every draw in a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneLighting {
    pub sun: DirectionalLight,
    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            sun: DirectionalLight::default(),
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_is_normalized() {
        let light = DirectionalLight::new(Vec3::new(0.0, -3.0, 4.0), Vec3::ONE, 2.0);
        assert!((light.direction.length() - 1.0).abs() < 1e-6);
        assert_eq!(std::mem::size_of::<DirectionalLight>(), 32);
    }

    #[test]
    fn test_zero_direction_falls_back_to_down() {
        let light = DirectionalLight::new(Vec3::ZERO, Vec3::ONE, 1.0);
        assert_eq!(light.direction, Vec3::NEG_Y);
    }
}
