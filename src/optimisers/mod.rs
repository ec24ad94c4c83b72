//! Local optimization of RANSAC hypotheses.
//!
//! After a trial fits a model, local optimization can refine it by
//! re-estimating from the current inliers.

pub use crate::core::LocalOptimizer;

use crate::core::{evaluate_model, Estimator, Scoring};
use crate::types::DataMatrix;

/// Least-squares hill climbing.
///
/// Refits from the current inlier mask, re-evaluates, and keeps the refit only
/// while the score strictly improves. Stops at the first refit that fails or
/// does not improve, so the result is a local optimum.
pub struct LeastSquaresOptimizer<'a, E: ?Sized, Sc: ?Sized> {
    estimator: &'a E,
    scoring: &'a Sc,
}

impl<'a, E: ?Sized, Sc: ?Sized> LeastSquaresOptimizer<'a, E, Sc> {
    pub fn new(estimator: &'a E, scoring: &'a Sc) -> Self {
        Self { estimator, scoring }
    }
}

impl<'a, E, Sc> LocalOptimizer<E::Model, Sc::Score> for LeastSquaresOptimizer<'a, E, Sc>
where
    E: Estimator + ?Sized,
    Sc: Scoring<E::Model> + ?Sized,
{
    fn run(
        &self,
        data: &DataMatrix,
        inliers: &[bool],
        model: &E::Model,
        score: &Sc::Score,
    ) -> (E::Model, Sc::Score, Vec<bool>) {
        let mut best = (model.clone(), score.clone(), inliers.to_vec());
        let mut mask = Vec::with_capacity(inliers.len());
        loop {
            let Some(refined) = self.estimator.estimate_model_nonminimal(data, &best.2) else {
                break;
            };
            let refined_score =
                evaluate_model(self.estimator, self.scoring, data, &refined, &[], &mut mask);
            if refined_score > best.1 {
                best = (refined, refined_score, std::mem::take(&mut mask));
            } else {
                break;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::FreeScaleEstimator;
    use crate::models::Transform;
    use crate::scoring::{InlierCountScoring, RegionBounds, Score};
    use crate::types::{point_pairs_from_keypoints, Keypoint};

    #[test]
    fn refinement_grows_inlier_set() {
        // Ground truth: x' = 1.02 x + 3, y' = 0.98 y - 2, with small noise.
        let noise = [0.05, -0.04, 0.03, -0.05, 0.02, 0.0, -0.03, 0.04];
        let pairs: Vec<_> = (0..8)
            .map(|i| {
                let (x, y) = (10.0 + 25.0 * i as f64, 200.0 - 20.0 * i as f64);
                let (u, v) = (1.02 * x + 3.0 + noise[i], 0.98 * y - 2.0 - noise[i]);
                (Keypoint::at(x, y), Keypoint::at(u, v))
            })
            .collect();
        let data = point_pairs_from_keypoints(&pairs);
        let estimator = FreeScaleEstimator::new(false);
        let scoring = InlierCountScoring::new(0.3, RegionBounds::default());

        // A rough hypothesis catching only part of the points.
        let rough = Transform::FreeScale {
            sx: 1.023,
            sy: 0.98,
            tx: 3.0,
            ty: -2.0,
        };
        let mut mask = Vec::new();
        let score = evaluate_model(&estimator, &scoring, &data, &rough, &[], &mut mask);
        assert!(score.inlier_count > 0 && score.inlier_count < 8);

        let optimizer = LeastSquaresOptimizer::new(&estimator, &scoring);
        let (refined, refined_score, refined_mask) = optimizer.run(&data, &mask, &rough, &score);
        assert_eq!(refined_score, Score::new(8));
        assert!(refined_mask.iter().all(|&b| b));
        assert_ne!(refined, rough);
    }

    #[test]
    fn no_refit_returns_input() {
        let data = DataMatrix::zeros(2, 6);
        let estimator = FreeScaleEstimator::new(false);
        let scoring = InlierCountScoring::new(1.0, RegionBounds::default());
        let model = Transform::FreeScale {
            sx: 1.0,
            sy: 1.0,
            tx: 0.0,
            ty: 0.0,
        };
        let optimizer = LeastSquaresOptimizer::new(&estimator, &scoring);
        let (out, score, mask) = optimizer.run(&data, &[false, false], &model, &Score::new(0));
        assert_eq!(out, model);
        assert_eq!(score, Score::new(0));
        assert_eq!(mask, vec![false, false]);
    }
}
