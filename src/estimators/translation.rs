//! Pure translation from one correspondence.

use crate::core::Estimator;
use crate::models::Transform;
use crate::types::DataMatrix;

use super::{dst_point, src_point};

/// `T = dst - src`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationEstimator;

impl Estimator for TranslationEstimator {
    type Model = Transform;

    fn sample_size(&self) -> usize {
        1
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        sample.len() == 1 && sample[0] < data.nrows()
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Option<Transform> {
        let row = *sample.first()?;
        let (sx, sy) = src_point(data, row);
        let (dx, dy) = dst_point(data, row);
        let model = Transform::Translation {
            tx: dx - sx,
            ty: dy - sy,
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
}
