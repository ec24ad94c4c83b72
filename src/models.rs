//! Transform families fitted by RANSAC.
//!
//! Every transform maps a source (query) point onto a destination
//! (reference) point.

use std::fmt;

use nalgebra::{Matrix2x3, Matrix3};

use crate::error::{ConfigError, ConfigResult};

/// Transform family, numbered as in the construction grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Translation = 1,
    SiftScale = 2,
    FreeScale = 3,
    Affine = 4,
    Perspective = 5,
}

impl ModelType {
    pub fn from_code(code: i64) -> ConfigResult<Self> {
        match code {
            1 => Ok(ModelType::Translation),
            2 => Ok(ModelType::SiftScale),
            3 => Ok(ModelType::FreeScale),
            4 => Ok(ModelType::Affine),
            5 => Ok(ModelType::Perspective),
            _ => Err(ConfigError::UnknownModel(code)),
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    /// Number of correspondences in a minimal sample.
    pub fn min_samples(self) -> usize {
        match self {
            ModelType::Translation | ModelType::SiftScale => 1,
            ModelType::FreeScale => 2,
            ModelType::Affine => 3,
            ModelType::Perspective => 4,
        }
    }

    /// Whether least-squares refinement applies to this family.
    pub fn supports_refinement(self) -> bool {
        matches!(self, ModelType::SiftScale | ModelType::FreeScale)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::Translation => "translation",
            ModelType::SiftScale => "sift-scale",
            ModelType::FreeScale => "free-scale",
            ModelType::Affine => "affine",
            ModelType::Perspective => "perspective",
        };
        f.write_str(name)
    }
}

/// Fitted transform parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Translation { tx: f64, ty: f64 },
    SiftScale { scale: f64, tx: f64, ty: f64 },
    FreeScale { sx: f64, sy: f64, tx: f64, ty: f64 },
    /// `[a b c; d e f]`
    Affine(Matrix2x3<f64>),
    /// `[a b c; d e f; g h i]`
    Perspective(Matrix3<f64>),
}

/// Matrix form reported for the matrix-valued families.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformMatrix {
    Affine(Matrix2x3<f64>),
    Perspective(Matrix3<f64>),
}

impl Transform {
    pub fn model_type(&self) -> ModelType {
        match self {
            Transform::Translation { .. } => ModelType::Translation,
            Transform::SiftScale { .. } => ModelType::SiftScale,
            Transform::FreeScale { .. } => ModelType::FreeScale,
            Transform::Affine(_) => ModelType::Affine,
            Transform::Perspective(_) => ModelType::Perspective,
        }
    }

    /// Project a source point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Transform::Translation { tx, ty } => (x + tx, y + ty),
            Transform::SiftScale { scale, tx, ty } => (scale * x + tx, scale * y + ty),
            Transform::FreeScale { sx, sy, tx, ty } => (sx * x + tx, sy * y + ty),
            Transform::Affine(m) => (
                m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)],
                m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)],
            ),
            Transform::Perspective(m) => {
                let w = m[(2, 0)] * x + m[(2, 1)] * y + m[(2, 2)];
                (
                    (m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)]) / w,
                    (m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)]) / w,
                )
            }
        }
    }

    /// Full 3x3 homogeneous form.
    pub fn homography_matrix(&self) -> Matrix3<f64> {
        match *self {
            Transform::Perspective(m) => m,
            _ => {
                let a = self.affine_matrix().unwrap_or_else(Matrix2x3::zeros);
                Matrix3::new(
                    a[(0, 0)],
                    a[(0, 1)],
                    a[(0, 2)],
                    a[(1, 0)],
                    a[(1, 1)],
                    a[(1, 2)],
                    0.0,
                    0.0,
                    1.0,
                )
            }
        }
    }

    /// 2x3 form; `None` for a perspective transform.
    pub fn affine_matrix(&self) -> Option<Matrix2x3<f64>> {
        match *self {
            Transform::Translation { tx, ty } => Some(Matrix2x3::new(1.0, 0.0, tx, 0.0, 1.0, ty)),
            Transform::SiftScale { scale, tx, ty } => {
                Some(Matrix2x3::new(scale, 0.0, tx, 0.0, scale, ty))
            }
            Transform::FreeScale { sx, sy, tx, ty } => {
                Some(Matrix2x3::new(sx, 0.0, tx, 0.0, sy, ty))
            }
            Transform::Affine(m) => Some(m),
            Transform::Perspective(_) => None,
        }
    }

    /// Matrix reported with a RANSAC result (affine and perspective only).
    pub fn matrix(&self) -> Option<TransformMatrix> {
        match *self {
            Transform::Affine(m) => Some(TransformMatrix::Affine(m)),
            Transform::Perspective(m) => Some(TransformMatrix::Perspective(m)),
            _ => None,
        }
    }

    /// Principal linear entries `a, b, d, e` plus `g, h` for a perspective
    /// transform.
    pub fn principal_entries(&self) -> Vec<f64> {
        match *self {
            Transform::Affine(m) => vec![m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]],
            Transform::Perspective(m) => vec![
                m[(0, 0)],
                m[(0, 1)],
                m[(1, 0)],
                m[(1, 1)],
                m[(2, 0)],
                m[(2, 1)],
            ],
            _ => Vec::new(),
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Transform::Translation { tx, ty } => tx.is_finite() && ty.is_finite(),
            Transform::SiftScale { scale, tx, ty } => {
                scale.is_finite() && tx.is_finite() && ty.is_finite()
            }
            Transform::FreeScale { sx, sy, tx, ty } => {
                [sx, sy, tx, ty].iter().all(|v| v.is_finite())
            }
            Transform::Affine(m) => m.iter().all(|v| v.is_finite()),
            Transform::Perspective(m) => m.iter().all(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Transform::Translation { tx, ty } => write!(f, "T=({tx:.1} {ty:.1})"),
            Transform::SiftScale { scale, tx, ty } => {
                write!(f, "S={scale:.1} T=({tx:.1} {ty:.1})")
            }
            Transform::FreeScale { sx, sy, tx, ty } => {
                write!(f, "S=({sx:.1} {sy:.1}) T=({tx:.1} {ty:.1})")
            }
            Transform::Affine(m) => write!(
                f,
                "A=[{:5.2} {:5.2}; {:5.2} {:5.2}] T=({:4.1} {:4.1})",
                m[(0, 0)],
                m[(0, 1)],
                m[(1, 0)],
                m[(1, 1)],
                m[(0, 2)],
                m[(1, 2)]
            ),
            Transform::Perspective(m) => write!(
                f,
                "A=[{:5.2} {:5.2} {:5.2}] [{:5.2} {:5.2} {:5.2}] [{:5.2} {:5.2} {:5.2}]",
                m[(0, 0)],
                m[(0, 1)],
                m[(0, 2)],
                m[(1, 0)],
                m[(1, 1)],
                m[(1, 2)],
                m[(2, 0)],
                m[(2, 1)],
                m[(2, 2)]
            ),
        }
    }
}

/// A transform with its per-correspondence inlier mask.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub transform: Transform,
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
}

impl FittedModel {
    pub fn new(transform: Transform, inliers: Vec<bool>) -> Self {
        let inlier_count = inliers.iter().filter(|&&b| b).count();
        Self {
            transform,
            inliers,
            inlier_count,
        }
    }

    /// Positions of the inlier correspondences.
    pub fn inlier_indices(&self) -> Vec<usize> {
        self.inliers
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect()
    }
}
