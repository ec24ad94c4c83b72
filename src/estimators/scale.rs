//! Scale + translation families.
//!
//! Both support closed-form least-squares refinement over mean-centered
//! inlier coordinates:
//! `s = Σ src·(dst − mean_dst) / Σ src·(src − mean_src)`, `t = mean_dst − s·mean_src`,
//! pooled over both axes for [`SiftScaleEstimator`], per axis for
//! [`FreeScaleEstimator`].

use std::ops::RangeInclusive;

use tracing::trace;

use crate::core::Estimator;
use crate::models::Transform;
use crate::types::{DataMatrix, COL_DST_RADIUS, COL_SRC_RADIUS};

use super::{dst_point, inlier_means, is_distinct_sample, src_point, COINCIDENCE_EPS};

const SCALE_RANGE: RangeInclusive<f64> = 0.2..=5.0;
const RATIO_RANGE: RangeInclusive<f64> = 0.333..=3.0;
const STRICT_SCALE_RANGE: RangeInclusive<f64> = 0.95..=1.05;
const STRICT_RATIO_RANGE: RangeInclusive<f64> = 0.97..=1.03;

/// Per-axis numerator and denominator sums of the refinement formula.
fn scale_sums(data: &DataMatrix, inliers: &[bool], means: [f64; 4]) -> ([f64; 2], [f64; 2]) {
    let [msx, msy, mdx, mdy] = means;
    let mut num = [0.0; 2];
    let mut den = [0.0; 2];
    for (row, _) in inliers
        .iter()
        .enumerate()
        .take(data.nrows())
        .filter(|(_, b)| **b)
    {
        let (sx, sy) = src_point(data, row);
        let (dx, dy) = dst_point(data, row);
        num[0] += sx * (dx - mdx);
        num[1] += sy * (dy - mdy);
        den[0] += sx * (sx - msx);
        den[1] += sy * (sy - msy);
    }
    (num, den)
}

/// Uniform scale from the ratio of keypoint radii.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiftScaleEstimator;

impl Estimator for SiftScaleEstimator {
    type Model = Transform;

    fn sample_size(&self) -> usize {
        1
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        let [row] = sample else {
            return false;
        };
        if *row >= data.nrows() {
            return false;
        }
        let valid = data[(*row, COL_SRC_RADIUS)] != 0.0 && data[(*row, COL_DST_RADIUS)] != 0.0;
        if !valid {
            trace!(row, "keypoints without scale, sample discarded");
        }
        valid
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Option<Transform> {
        let row = *sample.first()?;
        let scale = data[(row, COL_DST_RADIUS)] / data[(row, COL_SRC_RADIUS)];
        let (sx, sy) = src_point(data, row);
        let (dx, dy) = dst_point(data, row);
        let model = Transform::SiftScale {
            scale,
            tx: dx - scale * sx,
            ty: dy - scale * sy,
        };
        model.is_finite().then_some(model)
    }

    fn is_valid_model(
        &self,
        model: &Transform,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        model.is_finite()
    }

    fn estimate_model_nonminimal(&self, data: &DataMatrix, inliers: &[bool]) -> Option<Transform> {
        let means = inlier_means(data, inliers)?;
        let (num, den) = scale_sums(data, inliers, means);
        let scale = (num[0] + num[1]) / (den[0] + den[1]);
        let model = Transform::SiftScale {
            scale,
            tx: means[2] - scale * means[0],
            ty: means[3] - scale * means[1],
        };
        model.is_finite().then_some(model)
    }
}

/// Independent x/y scales from the coordinate deltas of two correspondences.
///
/// Models are rejected unless both scales lie in `[0.2, 5]` with ratio in
/// `[0.333, 3]`; in strict mode both scales must also lie in `[0.95, 1.05]`
/// with ratio in `[0.97, 1.03]`.
#[derive(Debug, Clone, Copy)]
pub struct FreeScaleEstimator {
    strict: bool,
}

impl FreeScaleEstimator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl Default for FreeScaleEstimator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Estimator for FreeScaleEstimator {
    type Model = Transform;

    fn sample_size(&self) -> usize {
        2
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        if !is_distinct_sample(data, sample, 2) {
            return false;
        }
        let (ax, ay) = src_point(data, sample[0]);
        let (bx, by) = src_point(data, sample[1]);
        (ax - bx).abs() >= COINCIDENCE_EPS && (ay - by).abs() >= COINCIDENCE_EPS
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Option<Transform> {
        let &[a, b] = sample else {
            return None;
        };
        let (s1x, s1y) = src_point(data, a);
        let (s2x, s2y) = src_point(data, b);
        let (d1x, d1y) = dst_point(data, a);
        let (d2x, d2y) = dst_point(data, b);
        let sx = (d1x - d2x) / (s1x - s2x);
        let sy = (d1y - d2y) / (s1y - s2y);
        let model = Transform::FreeScale {
            sx,
            sy,
            tx: d1x - sx * s1x,
            ty: d1y - sy * s1y,
        };
        model.is_finite().then_some(model)
    }

    fn is_valid_model(
        &self,
        model: &Transform,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        let Transform::FreeScale { sx, sy, .. } = *model else {
            return false;
        };
        if !model.is_finite() {
            return false;
        }
        let ratio = sx / sy;
        if !SCALE_RANGE.contains(&sx) || !SCALE_RANGE.contains(&sy) || !RATIO_RANGE.contains(&ratio)
        {
            return false;
        }
        !self.strict
            || (STRICT_SCALE_RANGE.contains(&sx)
                && STRICT_SCALE_RANGE.contains(&sy)
                && STRICT_RATIO_RANGE.contains(&ratio))
    }

    fn estimate_model_nonminimal(&self, data: &DataMatrix, inliers: &[bool]) -> Option<Transform> {
        let means = inlier_means(data, inliers)?;
        let (num, den) = scale_sums(data, inliers, means);
        let sx = num[0] / den[0];
        let sy = num[1] / den[1];
        let model = Transform::FreeScale {
            sx,
            sy,
            tx: means[2] - sx * means[0],
            ty: means[3] - sy * means[1],
        };
        model.is_finite().then_some(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{point_pairs_from_keypoints, Keypoint};

    fn scaled_pairs(s: (f64, f64), t: (f64, f64), points: &[(f64, f64)]) -> DataMatrix {
        let kps: Vec<_> = points
            .iter()
            .map(|&(x, y)| {
                (
                    Keypoint::new(x, y, 2.0, 0.0),
                    Keypoint::new(s.0 * x + t.0, s.1 * y + t.1, 2.0 * s.0, 0.0),
                )
            })
            .collect();
        point_pairs_from_keypoints(&kps)
    }

    #[test]
    fn sift_scale_from_radii() {
        let data = scaled_pairs((1.5, 1.5), (2.0, -1.0), &[(4.0, 6.0)]);
        let model = SiftScaleEstimator.estimate_model(&data, &[0]).unwrap();
        let Transform::SiftScale { scale, tx, ty } = model else {
            panic!("wrong family");
        };
        assert!((scale - 1.5).abs() < 1e-12);
        assert!((tx - 2.0).abs() < 1e-12);
        assert!((ty + 1.0).abs() < 1e-12);
    }

    #[test]
    fn sift_scale_needs_radii() {
        let data = point_pairs_from_keypoints(&[(Keypoint::at(1.0, 1.0), Keypoint::new(2.0, 2.0, 3.0, 0.0))]);
        assert!(!SiftScaleEstimator.is_valid_sample(&data, &[0]));
    }

    #[test]
    fn free_scale_rejects_aligned_pairs() {
        let data = scaled_pairs((1.0, 1.0), (0.0, 0.0), &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let est = FreeScaleEstimator::new(false);
        assert!(!est.is_valid_sample(&data, &[0, 1]));
        assert!(est.is_valid_sample(&data, &[0, 2]));
    }

    #[test]
    fn free_scale_gates() {
        let loose = FreeScaleEstimator::new(false);
        let strict = FreeScaleEstimator::new(true);
        let data = DataMatrix::zeros(0, 6);
        let model = |sx, sy| Transform::FreeScale { sx, sy, tx: 0.0, ty: 0.0 };

        assert!(loose.is_valid_model(&model(2.0, 2.0), &data, &[], 1.0));
        assert!(!strict.is_valid_model(&model(2.0, 2.0), &data, &[], 1.0));
        assert!(strict.is_valid_model(&model(1.02, 1.0), &data, &[], 1.0));
        assert!(!strict.is_valid_model(&model(1.04, 0.96), &data, &[], 1.0));
        assert!(!loose.is_valid_model(&model(0.1, 0.1), &data, &[], 1.0));
        assert!(!loose.is_valid_model(&model(4.0, 1.0), &data, &[], 1.0));
    }

    #[test]
    fn free_scale_refinement_is_exact_on_clean_data() {
        let points = [(0.0, 0.0), (3.0, 1.0), (1.0, 4.0), (5.0, 5.0)];
        let data = scaled_pairs((2.0, 0.5), (5.0, -3.0), &points);
        let model = FreeScaleEstimator::new(false)
            .estimate_model_nonminimal(&data, &[true; 4])
            .unwrap();
        let Transform::FreeScale { sx, sy, tx, ty } = model else {
            panic!("wrong family");
        };
        assert!((sx - 2.0).abs() < 1e-9 && (sy - 0.5).abs() < 1e-9);
        assert!((tx - 5.0).abs() < 1e-9 && (ty + 3.0).abs() < 1e-9);
    }

    #[test]
    fn sift_scale_refinement_pools_axes() {
        let points = [(1.0, 2.0), (4.0, 1.0), (2.0, 7.0)];
        let data = scaled_pairs((3.0, 3.0), (1.0, 1.0), &points);
        let model = SiftScaleEstimator
            .estimate_model_nonminimal(&data, &[true, true, true])
            .unwrap();
        let Transform::SiftScale { scale, tx, ty } = model else {
            panic!("wrong family");
        };
        assert!((scale - 3.0).abs() < 1e-9);
        assert!((tx - 1.0).abs() < 1e-9 && (ty - 1.0).abs() < 1e-9);
        assert!(SiftScaleEstimator
            .estimate_model_nonminimal(&data, &[false, false, false])
            .is_none());
    }
}
