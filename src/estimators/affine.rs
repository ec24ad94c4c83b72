//! Closed-form 3-point affine estimator.

use nalgebra::{DMatrix, Matrix2x3};

use crate::core::Estimator;
use crate::models::Transform;
use crate::types::DataMatrix;
use crate::utils::gauss_elimination;

use super::{dst_point, is_distinct_sample, src_point};

/// Solves `[a b c; d e f]` exactly from three correspondences.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffineEstimator;

impl Estimator for AffineEstimator {
    type Model = Transform;

    fn sample_size(&self) -> usize {
        3
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        is_distinct_sample(data, sample, 3)
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Option<Transform> {
        if sample.len() != 3 {
            return None;
        }
        // Unknowns [a b c d e f].
        let mut augmented = DMatrix::<f64>::zeros(6, 7);
        for (i, &row) in sample.iter().enumerate() {
            let (x, y) = src_point(data, row);
            let (u, v) = dst_point(data, row);

            augmented[(2 * i, 0)] = x;
            augmented[(2 * i, 1)] = y;
            augmented[(2 * i, 2)] = 1.0;
            augmented[(2 * i, 6)] = u;

            augmented[(2 * i + 1, 3)] = x;
            augmented[(2 * i + 1, 4)] = y;
            augmented[(2 * i + 1, 5)] = 1.0;
            augmented[(2 * i + 1, 6)] = v;
        }

        // Collinear samples leave the system singular.
        let p = gauss_elimination(augmented)?;
        let model = Transform::Affine(Matrix2x3::new(p[0], p[1], p[2], p[3], p[4], p[5]));
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{point_pairs_from_keypoints, Keypoint};

    #[test]
    fn affine_recovers_exact_transform() {
        let truth = Transform::Affine(Matrix2x3::new(1.1, 0.2, 5.0, -0.1, 0.9, -3.0));
        let kps: Vec<_> = [(0.0, 0.0), (10.0, 1.0), (3.0, 12.0)]
            .iter()
            .map(|&(x, y)| {
                let (u, v) = truth.apply(x, y);
                (Keypoint::at(x, y), Keypoint::at(u, v))
            })
            .collect();
        let data = point_pairs_from_keypoints(&kps);

        let est = AffineEstimator;
        assert!(est.is_valid_sample(&data, &[0, 1, 2]));
        let Some(Transform::Affine(m)) = est.estimate_model(&data, &[0, 1, 2]) else {
            panic!("expected an affine model");
        };
        let Transform::Affine(t) = truth else { unreachable!() };
        assert!((m - t).abs().max() < 1e-9);
    }

    #[test]
    fn collinear_sample_yields_no_model() {
        let kps: Vec<_> = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]
            .iter()
            .map(|&(x, y)| (Keypoint::at(x, y), Keypoint::at(x + 1.0, y)))
            .collect();
        let data = point_pairs_from_keypoints(&kps);
        assert!(AffineEstimator.is_valid_sample(&data, &[0, 1, 2]));
        assert!(AffineEstimator.estimate_model(&data, &[0, 1, 2]).is_none());
    }
}
