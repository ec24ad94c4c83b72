//! Traits at the seams of the RANSAC pipeline.
//!
//! A trial runs `SAMPLE -> FIT -> EVALUATE -> (REFINE -> EVALUATE)* -> SCORE`:
//! - [`Sampler`] draws the minimal sample,
//! - [`Estimator`] fits and validates a model,
//! - [`Scoring`] flags inliers and produces a comparable score,
//! - [`LocalOptimizer`] refines a model from its inliers.
//!
//! The data matrix holds one correspondence per row, see [`crate::types`].

use crate::types::DataMatrix;

/// Fits model hypotheses from correspondence subsets.
pub trait Estimator {
    /// Model type produced by this estimator.
    type Model: Clone;

    /// Size of a minimal sample.
    fn sample_size(&self) -> usize;

    /// Reject geometrically degenerate samples before fitting.
    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool;

    /// Fit a model from a minimal sample; `None` means the sample was
    /// degenerate.
    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Option<Self::Model>;

    /// Plausibility check run before scoring.
    fn is_valid_model(
        &self,
        model: &Self::Model,
        data: &DataMatrix,
        sample: &[usize],
        threshold: f64,
    ) -> bool;

    /// Refit from every row flagged in `inliers`.
    ///
    /// Estimators without a closed-form refit return `None`.
    fn estimate_model_nonminimal(
        &self,
        _data: &DataMatrix,
        _inliers: &[bool],
    ) -> Option<Self::Model> {
        None
    }
}

/// Draws minimal samples from the data.
pub trait Sampler {
    /// Draw `sample_size` distinct row indices into `out_indices`.
    ///
    /// Returns `false` if no sample can be drawn.
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool;

    /// Update sampler state after an iteration.
    fn update(&mut self, sample: &[usize], sample_size: usize, iteration: usize, score_hint: f64);
}

/// Evaluates a model against every row.
pub trait Scoring<M> {
    /// Comparable score; `Default` is the score of a rejected model.
    type Score: Clone + PartialOrd + Default;

    /// Inlier/outlier threshold in pixels.
    fn threshold(&self) -> f64;

    /// Score `model`, writing one inlier flag per row into `inliers_out`.
    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<bool>) -> Self::Score;
}

/// Refines a model using its inliers.
pub trait LocalOptimizer<M, S: Clone> {
    /// Returns `(refined_model, refined_score, refined_inliers)`; the input is
    /// returned unchanged when no improvement is found.
    fn run(&self, data: &DataMatrix, inliers: &[bool], model: &M, score: &S) -> (M, S, Vec<bool>);
}

/// Validate then score `model`. An implausible model scores
/// `Score::default()` with an all-false mask.
pub fn evaluate_model<E, Sc>(
    estimator: &E,
    scoring: &Sc,
    data: &DataMatrix,
    model: &E::Model,
    sample: &[usize],
    inliers_out: &mut Vec<bool>,
) -> Sc::Score
where
    E: Estimator + ?Sized,
    Sc: Scoring<E::Model> + ?Sized,
{
    if !estimator.is_valid_model(model, data, sample, scoring.threshold()) {
        inliers_out.clear();
        inliers_out.resize(data.nrows(), false);
        return Sc::Score::default();
    }
    scoring.score(data, model, inliers_out)
}
