//! Node-local transforms.
//!
//! A node's local transform comes either from an explicit matrix or from
//! decomposed translation / rotation / scale. The two sources are exclusive:
//! when a source supplies both, the matrix is kept and TRS is discarded.

use glam::{Mat4, Quat, Vec3};

/// Decomposed translation, rotation and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trs {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Trs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Trs {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocalTransform {
    Matrix(Mat4),
    Trs(Trs),
}

impl Default for LocalTransform {
    fn default() -> Self {
        LocalTransform::Trs(Trs::IDENTITY)
    }
}

impl From<Trs> for LocalTransform {
    fn from(trs: Trs) -> Self {
        LocalTransform::Trs(trs)
    }
}

impl From<Mat4> for LocalTransform {
    fn from(matrix: Mat4) -> Self {
        LocalTransform::Matrix(matrix)
    }
}

impl LocalTransform {
    /// Builds a local transform from source data that may carry both a
    /// matrix and TRS fields. A present matrix wins.
    pub fn from_source(matrix: Option<Mat4>, trs: Trs) -> Self {
        match matrix {
            Some(matrix) => LocalTransform::Matrix(matrix),
            None => LocalTransform::Trs(trs),
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        LocalTransform::Trs(Trs::from_translation(translation))
    }

    pub fn matrix(&self) -> Mat4 {
        match self {
            LocalTransform::Matrix(matrix) => *matrix,
            LocalTransform::Trs(trs) => trs.matrix(),
        }
    }

    /// TRS view of this transform. Matrices are decomposed.
    pub fn trs(&self) -> Trs {
        match self {
            LocalTransform::Matrix(matrix) => {
                let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
                Trs {
                    translation,
                    rotation,
                    scale,
                }
            }
            LocalTransform::Trs(trs) => *trs,
        }
    }

    /// Mutable TRS access. A matrix-sourced transform is converted to TRS
    /// by decomposition on first write.
    pub fn trs_mut(&mut self) -> &mut Trs {
        if let LocalTransform::Matrix(_) = self {
            *self = LocalTransform::Trs(self.trs());
        }
        match self {
            LocalTransform::Trs(trs) => trs,
            LocalTransform::Matrix(_) => unreachable!("converted to TRS above"),
        }
    }

    pub fn translation(&self) -> Vec3 {
        match self {
            LocalTransform::Matrix(matrix) => matrix.w_axis.truncate(),
            LocalTransform::Trs(trs) => trs.translation,
        }
    }
}

/// Inverse-transpose of `model` for transforming normals. Falls back to
/// identity for singular matrices.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    const EPSILON: f32 = 1e-6;
    if model.determinant().abs() < EPSILON {
        Mat4::IDENTITY
    } else {
        model.inverse().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        assert_eq!(LocalTransform::default().matrix(), Mat4::IDENTITY);
        assert!(Trs::default().is_identity());
    }

    #[test]
    fn test_matrix_wins_over_trs() {
        let matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let trs = Trs::from_translation(Vec3::new(9.0, 9.0, 9.0)).with_scale(Vec3::splat(4.0));

        let local = LocalTransform::from_source(Some(matrix), trs);
        assert_eq!(local, LocalTransform::Matrix(matrix));
        assert_eq!(local.matrix(), matrix);
    }

    #[test]
    fn test_trs_used_without_matrix() {
        let trs = Trs::from_translation(Vec3::new(0.0, 1.0, 0.0)).with_scale(Vec3::splat(2.0));
        let local = LocalTransform::from_source(None, trs);
        assert_eq!(local.matrix(), trs.matrix());
    }

    #[test]
    fn test_trs_mut_decomposes_matrix() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let matrix = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            rotation,
            Vec3::new(1.0, 0.0, -1.0),
        );
        let mut local = LocalTransform::Matrix(matrix);

        local.trs_mut().translation.y = 5.0;

        let LocalTransform::Trs(trs) = local else {
            panic!("expected TRS after write");
        };
        assert!(trs.translation.abs_diff_eq(Vec3::new(1.0, 5.0, -1.0), 1e-5));
        assert!(trs.scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));
        assert!(trs.rotation.abs_diff_eq(rotation, 1e-5));
    }

    #[test]
    fn test_translation_of_matrix() {
        let local = LocalTransform::Matrix(Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0)));
        assert_eq!(local.translation(), Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_normal_matrix_non_invertible() {
        let model = Trs::IDENTITY.with_scale(Vec3::ZERO).matrix();
        assert_eq!(normal_matrix(model), Mat4::IDENTITY);
    }

    #[test]
    fn test_normal_matrix_with_scale() {
        let model = Trs::IDENTITY.with_scale(Vec3::new(1.0, 2.0, 1.0)).matrix();
        assert_eq!(normal_matrix(model), model.inverse().transpose());
    }
}
