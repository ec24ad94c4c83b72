//! Estimators for the five transform families.
//!
//! - Translation (1 correspondence)
//! - SIFT scale: uniform scale from keypoint radii (1 correspondence)
//! - Free scale: independent x/y scales (2 correspondences)
//! - Affine (3 correspondences)
//! - Homography / perspective (4 correspondences)

pub mod affine;
pub mod homography;
pub mod scale;
pub mod translation;

pub use affine::AffineEstimator;
pub use homography::HomographyEstimator;
pub use scale::{FreeScaleEstimator, SiftScaleEstimator};
pub use translation::TranslationEstimator;

use crate::core::Estimator;
use crate::models::{ModelType, Transform};
use crate::types::{DataMatrix, COL_DST_X, COL_DST_Y, COL_SRC_X, COL_SRC_Y};

/// Points closer than this in both axes are treated as coincident.
pub(crate) const COINCIDENCE_EPS: f64 = 1e-9;

/// Estimator behind a model type, as a trait object.
pub type DynEstimator = dyn Estimator<Model = Transform> + Send + Sync;

/// Estimator for `model_type`. `strict_scale` only affects the free-scale
/// family.
pub fn for_model(model_type: ModelType, strict_scale: bool) -> Box<DynEstimator> {
    match model_type {
        ModelType::Translation => Box::new(TranslationEstimator),
        ModelType::SiftScale => Box::new(SiftScaleEstimator),
        ModelType::FreeScale => Box::new(FreeScaleEstimator::new(strict_scale)),
        ModelType::Affine => Box::new(AffineEstimator),
        ModelType::Perspective => Box::new(HomographyEstimator),
    }
}

pub(crate) fn src_point(data: &DataMatrix, row: usize) -> (f64, f64) {
    (data[(row, COL_SRC_X)], data[(row, COL_SRC_Y)])
}

pub(crate) fn dst_point(data: &DataMatrix, row: usize) -> (f64, f64) {
    (data[(row, COL_DST_X)], data[(row, COL_DST_Y)])
}

fn coincide(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < COINCIDENCE_EPS && (a.1 - b.1).abs() < COINCIDENCE_EPS
}

/// Sample indices are in range and no two rows share a source or a
/// destination point.
pub(crate) fn is_distinct_sample(data: &DataMatrix, sample: &[usize], size: usize) -> bool {
    if sample.len() != size || sample.iter().any(|&row| row >= data.nrows()) {
        return false;
    }
    for i in 0..sample.len() {
        for j in (i + 1)..sample.len() {
            let (a, b) = (sample[i], sample[j]);
            if a == b
                || coincide(src_point(data, a), src_point(data, b))
                || coincide(dst_point(data, a), dst_point(data, b))
            {
                return false;
            }
        }
    }
    true
}

/// Incremental means `(src_x, src_y, dst_x, dst_y)` over flagged rows.
pub(crate) fn inlier_means(data: &DataMatrix, inliers: &[bool]) -> Option<[f64; 4]> {
    let mut means = [0.0; 4];
    let mut count = 0.0;
    for (row, _) in inliers.iter().enumerate().filter(|(_, b)| **b) {
        if row >= data.nrows() {
            break;
        }
        count += 1.0;
        let (sx, sy) = src_point(data, row);
        let (dx, dy) = dst_point(data, row);
        for (mean, value) in means.iter_mut().zip([sx, sy, dx, dy]) {
            *mean += (value - *mean) / count;
        }
    }
    (count > 0.0).then_some(means)
}
