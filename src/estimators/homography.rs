//! Homography (perspective) estimator using the 4-point DLT formulation.

use nalgebra::{DMatrix, Matrix3};

use crate::core::Estimator;
use crate::models::Transform;
use crate::types::DataMatrix;
use crate::utils::gauss_elimination;

use super::{dst_point, is_distinct_sample, src_point};

/// Minimal homography estimator; fixes `h[8] = 1` and solves the 8x8 system.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomographyEstimator;

impl Estimator for HomographyEstimator {
    type Model = Transform;

    fn sample_size(&self) -> usize {
        4
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        is_distinct_sample(data, sample, 4)
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Option<Transform> {
        if sample.len() != 4 {
            return None;
        }
        // [A | b] with h[8] = 1.
        let mut augmented = DMatrix::<f64>::zeros(8, 9);
        for (i, &row) in sample.iter().enumerate() {
            let (x1, y1) = src_point(data, row);
            let (x2, y2) = dst_point(data, row);

            augmented[(2 * i, 0)] = -x1;
            augmented[(2 * i, 1)] = -y1;
            augmented[(2 * i, 2)] = -1.0;
            augmented[(2 * i, 6)] = x2 * x1;
            augmented[(2 * i, 7)] = x2 * y1;
            augmented[(2 * i, 8)] = -x2;

            augmented[(2 * i + 1, 3)] = -x1;
            augmented[(2 * i + 1, 4)] = -y1;
            augmented[(2 * i + 1, 5)] = -1.0;
            augmented[(2 * i + 1, 6)] = y2 * x1;
            augmented[(2 * i + 1, 7)] = y2 * y1;
            augmented[(2 * i + 1, 8)] = -y2;
        }

        let h = gauss_elimination(augmented)?;
        let model = Transform::Perspective(Matrix3::new(
            h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
        ));
        model.is_finite().then_some(model)
    }

    fn is_valid_model(
        &self,
        model: &Transform,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        match model {
            Transform::Perspective(h) => model.is_finite() && h.determinant().abs() > 1e-12,
            _ => false,
        }
    }
}
