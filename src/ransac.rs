//! Fixed-budget RANSAC over a correspondence set.
//!
//! Each trial samples a minimal subset uniformly from all correspondences,
//! fits the configured transform family, evaluates it and optionally refines
//! it by least squares. The model with the most inliers wins; among equal
//! counts the earliest trial is kept.

use std::ops::Range;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::core::{evaluate_model, Estimator, Sampler};
use crate::descriptors::LocalDescriptorSet;
use crate::error::{ConfigError, ConfigResult};
use crate::estimators::{self, DynEstimator};
use crate::models::{FittedModel, Transform, TransformMatrix};
use crate::optimisers::{LeastSquaresOptimizer, LocalOptimizer};
use crate::samplers::UniformRandomSampler;
use crate::scoring::{InlierCountScoring, Score};
use crate::settings::RansacSettings;
use crate::types::{point_pairs, CorrespondenceSet, DataMatrix};
use crate::utils::UniformRandomGenerator;

/// Best model of the last [`RansacController::compute_matches`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacOutcome {
    /// Inlier correspondences, in input order.
    pub matches: CorrespondenceSet,
    pub transform: Transform,
    pub inlier_count: usize,
    /// Set for affine and perspective models.
    pub matrix: Option<TransformMatrix>,
}

/// One contiguous block of trials with its own sampler seed.
#[derive(Debug, Clone, PartialEq)]
struct TrialBlock {
    trials: Range<usize>,
    seed: u64,
}

/// Split `num_cycles` trials into at most `num_workers` contiguous ranges,
/// never more ranges than trials.
fn trial_ranges(num_cycles: usize, num_workers: usize) -> Vec<Range<usize>> {
    let num_workers = num_workers.clamp(1, num_cycles.max(1));
    let chunk = num_cycles.div_ceil(num_workers);
    (0..num_workers)
        .map(|w| {
            let start = (w * chunk).min(num_cycles);
            start..((w + 1) * chunk).min(num_cycles)
        })
        .collect()
}

pub struct RansacController {
    settings: RansacSettings,
    estimator: Box<DynEstimator>,
    scoring: InlierCountScoring,
    rng: UniformRandomGenerator,
    last_input: CorrespondenceSet,
    last_model: Option<FittedModel>,
}

impl RansacController {
    pub fn new(mut settings: RansacSettings) -> ConfigResult<Self> {
        settings.validate()?;
        settings.min_matches = settings.effective_min_matches();
        let rng = match settings.seed {
            Some(seed) => UniformRandomGenerator::from_seed(seed),
            None => UniformRandomGenerator::new(),
        };
        info!(
            num_cycles = settings.num_cycles,
            model_type = %settings.model_type,
            dist_max_inliers = settings.dist_max_inliers,
            min_matches = settings.min_matches,
            correction = settings.correction,
            workers = settings.num_workers,
            "RANSAC configured"
        );
        Ok(Self {
            estimator: estimators::for_model(settings.model_type, settings.strict_scale),
            scoring: InlierCountScoring::new(settings.dist_max_inliers, settings.region_bounds()),
            rng,
            last_input: CorrespondenceSet::new(),
            last_model: None,
            settings,
        })
    }

    pub fn settings(&self) -> &RansacSettings {
        &self.settings
    }

    /// Run the trials on `matches` between `query` (source points) and
    /// `reference` (destination points). Returns the best inlier count, `0`
    /// when no model is found or the input is too small.
    pub fn compute_matches(
        &mut self,
        query: &LocalDescriptorSet,
        reference: &LocalDescriptorSet,
        matches: &CorrespondenceSet,
    ) -> usize {
        self.reset();
        let min_matches = self.settings.min_matches;
        if query.len() < min_matches || reference.len() < min_matches {
            return 0;
        }
        debug!(matches = matches.len(), "pre-RANSAC");
        if matches.len() < min_matches {
            return 0;
        }
        let Some(data) = point_pairs(query, reference, matches) else {
            warn!("correspondence refers to a keypoint outside its set");
            return 0;
        };

        let blocks: Vec<TrialBlock> = trial_ranges(self.settings.num_cycles, self.settings.num_workers)
            .into_iter()
            .map(|trials| TrialBlock {
                trials,
                seed: self.rng.next_seed(),
            })
            .collect();

        let best = self.search(&data, &blocks);
        self.last_input = matches.clone();
        match best {
            Some(fitted) => {
                debug!(model = %fitted.transform, inliers = fitted.inlier_count, "post-RANSAC");
                let count = fitted.inlier_count;
                self.last_model = Some(fitted);
                count
            }
            None => {
                debug!(inliers = 0, "post-RANSAC");
                0
            }
        }
    }

    #[cfg(feature = "rayon")]
    fn search(&self, data: &DataMatrix, blocks: &[TrialBlock]) -> Option<FittedModel> {
        use rayon::prelude::*;

        let bests: Vec<_> = blocks
            .par_iter()
            .map(|block| self.run_block(data, block))
            .collect();
        reduce_in_order(bests)
    }

    #[cfg(not(feature = "rayon"))]
    fn search(&self, data: &DataMatrix, blocks: &[TrialBlock]) -> Option<FittedModel> {
        let bests: Vec<_> = blocks.iter().map(|block| self.run_block(data, block)).collect();
        reduce_in_order(bests)
    }

    fn run_block(&self, data: &DataMatrix, block: &TrialBlock) -> Option<(Score, Transform, Vec<bool>)> {
        let estimator: &DynEstimator = &*self.estimator;
        let optimizer = LeastSquaresOptimizer::new(estimator, &self.scoring);
        let refine = self.settings.correction && self.settings.model_type.supports_refinement();
        let sample_size = estimator.sample_size();

        let mut sampler = UniformRandomSampler::from_seed(block.seed);
        let mut sample = vec![0usize; sample_size];
        let mut mask = Vec::with_capacity(data.nrows());
        let mut best: Option<(Score, Transform, Vec<bool>)> = None;

        for iteration in block.trials.clone() {
            if !sampler.sample(data, sample_size, &mut sample) {
                break;
            }
            if !estimator.is_valid_sample(data, &sample) {
                continue;
            }
            let Some(mut model) = estimator.estimate_model(data, &sample) else {
                continue;
            };
            let mut score = evaluate_model(estimator, &self.scoring, data, &model, &sample, &mut mask);
            if refine && score.inlier_count > 0 {
                (model, score, mask) = optimizer.run(data, &mask, &model, &score);
            }
            if score.inlier_count > 0 && best.as_ref().map_or(true, |(b, ..)| score > *b) {
                best = Some((score, model, mask.clone()));
            }
            sampler.update(&sample, sample_size, iteration, score.inlier_count as f64);
        }
        best
    }

    /// Forget the last result.
    pub fn reset(&mut self) {
        self.last_input = CorrespondenceSet::new();
        self.last_model = None;
    }

    /// Best fitted model with its per-correspondence inlier mask.
    pub fn fitted_model(&self) -> Option<&FittedModel> {
        self.last_model.as_ref()
    }

    /// Inlier correspondences and transform of the last call.
    pub fn last_model(&self) -> Option<RansacOutcome> {
        let fitted = self.last_model.as_ref()?;
        Some(RansacOutcome {
            matches: self.inlier_matches(fitted),
            transform: fitted.transform,
            inlier_count: fitted.inlier_count,
            matrix: fitted.transform.matrix(),
        })
    }

    /// Inlier correspondences of the last call; empty without a model.
    pub fn last_matches(&self) -> CorrespondenceSet {
        self.last_model
            .as_ref()
            .map(|fitted| self.inlier_matches(fitted))
            .unwrap_or_default()
    }

    fn inlier_matches(&self, fitted: &FittedModel) -> CorrespondenceSet {
        fitted
            .inlier_indices()
            .into_iter()
            .filter_map(|i| self.last_input.get(i).copied())
            .collect()
    }
}

/// Keep the first block's best unless a later block is strictly better.
fn reduce_in_order(bests: Vec<Option<(Score, Transform, Vec<bool>)>>) -> Option<FittedModel> {
    let mut best: Option<(Score, Transform, Vec<bool>)> = None;
    for candidate in bests.into_iter().flatten() {
        if best.as_ref().map_or(true, |(b, ..)| candidate.0 > *b) {
            best = Some(candidate);
        }
    }
    best.map(|(_, transform, mask)| FittedModel::new(transform, mask))
}

impl FromStr for RansacController {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::Datatype;
    use crate::models::ModelType;
    use crate::types::{Correspondence, Keypoint};

    fn sets(pairs: &[((f64, f64), (f64, f64))]) -> (LocalDescriptorSet, LocalDescriptorSet, CorrespondenceSet) {
        let mut q = LocalDescriptorSet::new(pairs.len(), Datatype::UInt8, 1);
        let mut r = LocalDescriptorSet::new(pairs.len(), Datatype::UInt8, 1);
        for (i, &((qx, qy), (rx, ry))) in pairs.iter().enumerate() {
            q.set_keypoint(i, Keypoint::at(qx, qy));
            r.set_keypoint(i, Keypoint::at(rx, ry));
        }
        let matches = (0..pairs.len()).map(|i| Correspondence::new(i, i)).collect();
        (q, r, matches)
    }

    fn settings(model_type: ModelType, num_cycles: usize, dist: f64) -> RansacSettings {
        RansacSettings {
            seed: Some(11),
            ..RansacSettings::new(model_type, num_cycles, dist)
        }
    }

    #[test]
    fn trial_ranges_cover_all_cycles() {
        assert_eq!(trial_ranges(10, 1), vec![0..10]);
        assert_eq!(trial_ranges(10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(trial_ranges(2, 4), vec![0..1, 1..2]);
        assert_eq!(trial_ranges(0, 2), vec![0..0]);
        assert_eq!(trial_ranges(3, usize::MAX), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn translation_with_outliers() {
        let mut pairs: Vec<_> = (0..6)
            .map(|i| {
                let (x, y) = (i as f64 * 7.0, 3.0 + i as f64);
                ((x, y), (x + 4.0, y - 1.0))
            })
            .collect();
        pairs.push(((1.0, 1.0), (90.0, 40.0)));
        pairs.push(((2.0, 5.0), (-30.0, 8.0)));
        let (q, r, matches) = sets(&pairs);

        let mut ransac = RansacController::new(settings(ModelType::Translation, 50, 0.1)).unwrap();
        assert_eq!(ransac.compute_matches(&q, &r, &matches), 6);

        let outcome = ransac.last_model().unwrap();
        assert_eq!(outcome.inlier_count, 6);
        assert_eq!(outcome.matches.index_pairs(), (0..6).map(|i| (i, i)).collect::<Vec<_>>());
        assert_eq!(outcome.matrix, None);
        let Transform::Translation { tx, ty } = outcome.transform else {
            panic!("expected a translation, got {:?}", outcome.transform);
        };
        assert!((tx - 4.0).abs() < 1e-9 && (ty + 1.0).abs() < 1e-9);
        assert_eq!(ransac.last_matches(), outcome.matches);
    }

    #[test]
    fn below_min_matches_returns_zero() {
        let (q, r, matches) = sets(&[((0.0, 0.0), (1.0, 1.0)), ((5.0, 0.0), (6.0, 1.0))]);
        let mut ransac = RansacController::new(settings(ModelType::Affine, 10, 1.0)).unwrap();
        assert_eq!(ransac.compute_matches(&q, &r, &matches), 0);
        assert!(ransac.last_model().is_none());
        assert!(ransac.last_matches().is_empty());
    }

    #[test]
    fn affine_reports_its_matrix() {
        let pairs: Vec<_> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (7.0, 3.0)]
            .iter()
            .map(|&(x, y)| ((x, y), (1.1 * x + 0.1 * y + 2.0, -0.05 * x + 0.9 * y + 1.0)))
            .collect();
        let (q, r, matches) = sets(&pairs);
        let mut ransac = RansacController::new(settings(ModelType::Affine, 20, 1e-6)).unwrap();
        assert_eq!(ransac.compute_matches(&q, &r, &matches), 4);
        let outcome = ransac.last_model().unwrap();
        let Some(TransformMatrix::Affine(m)) = outcome.matrix else {
            panic!("expected an affine matrix");
        };
        assert!((m[(0, 0)] - 1.1).abs() < 1e-9);
        assert!((m[(1, 2)] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn worker_split_is_deterministic() {
        let pairs: Vec<_> = (0..12)
            .map(|i| {
                let (x, y) = ((i * 13 % 17) as f64, (i * 7 % 11) as f64);
                if i % 4 == 0 {
                    ((x, y), (x * 3.0, y - 20.0))
                } else {
                    ((x, y), (x + 1.5, y + 2.5))
                }
            })
            .collect();
        let (q, r, matches) = sets(&pairs);
        let mut a = RansacController::new(RansacSettings {
            num_workers: 3,
            ..settings(ModelType::Translation, 30, 0.5)
        })
        .unwrap();
        let mut b = RansacController::new(RansacSettings {
            num_workers: 3,
            ..settings(ModelType::Translation, 30, 0.5)
        })
        .unwrap();
        assert_eq!(a.compute_matches(&q, &r, &matches), 9);
        assert_eq!(b.compute_matches(&q, &r, &matches), 9);
        assert_eq!(a.last_model(), b.last_model());
    }

    #[test]
    fn reduction_keeps_earliest_on_ties() {
        let first = (Score::new(3), Transform::Translation { tx: 1.0, ty: 0.0 }, vec![true; 3]);
        let tie = (Score::new(3), Transform::Translation { tx: 2.0, ty: 0.0 }, vec![true; 3]);
        let better = (Score::new(4), Transform::Translation { tx: 3.0, ty: 0.0 }, vec![true; 4]);

        let best = reduce_in_order(vec![None, Some(first.clone()), Some(tie.clone())]).unwrap();
        assert_eq!(best.transform, first.1);
        let best = reduce_in_order(vec![Some(first), Some(tie), Some(better.clone())]).unwrap();
        assert_eq!(best.transform, better.1);
        assert!(reduce_in_order(vec![None, None]).is_none());
    }

    #[test]
    fn parses_from_construction_string() {
        let ransac: RansacController = "3_100_1.5_CORRECTION_SEED_5".parse().unwrap();
        assert_eq!(ransac.settings().model_type, ModelType::FreeScale);
        assert!(ransac.settings().correction);
        assert!("7_100_1.5".parse::<RansacController>().is_err());
    }
}
