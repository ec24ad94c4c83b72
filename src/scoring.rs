//! Inlier-count scoring with destination-region plausibility gates.

use crate::core::Scoring;
use crate::models::Transform;
use crate::types::{DataMatrix, COL_DST_X, COL_DST_Y, COL_SRC_X, COL_SRC_Y};

/// Number of inliers; higher is better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    pub inlier_count: usize,
}

impl Score {
    pub fn new(inlier_count: usize) -> Self {
        Self { inlier_count }
    }
}

/// Bounds on the destination-space bounding box of the inliers.
///
/// A bound of `0` is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionBounds {
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub min_ratio_wh: f64,
    pub max_ratio_wh: f64,
}

impl RegionBounds {
    pub fn is_active(&self) -> bool {
        [
            self.min_width,
            self.max_width,
            self.min_height,
            self.max_height,
            self.min_ratio_wh,
            self.max_ratio_wh,
        ]
        .iter()
        .any(|&b| b > 0.0)
    }

    /// Whether a `width x height` box violates any enabled bound.
    pub fn rejects(&self, width: f64, height: f64) -> bool {
        let ratio = width / height;
        (self.min_width > 0.0 && width < self.min_width)
            || (self.max_width > 0.0 && width > self.max_width)
            || (self.min_height > 0.0 && height < self.min_height)
            || (self.max_height > 0.0 && height > self.max_height)
            || (self.min_ratio_wh > 0.0 && ratio < self.min_ratio_wh)
            || (self.max_ratio_wh > 0.0 && ratio > self.max_ratio_wh)
    }
}

/// Flags a correspondence as inlier when its projected source point lies
/// within `threshold` (Euclidean) of its destination point.
///
/// With any region bound enabled, the inlier set is emptied when the
/// inliers' destination bounding box violates a bound, or, with
/// `min_ratio_wh` enabled, when an affine/perspective model has a negative
/// principal entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InlierCountScoring {
    threshold: f64,
    bounds: RegionBounds,
}

impl InlierCountScoring {
    pub fn new(threshold: f64, bounds: RegionBounds) -> Self {
        Self { threshold, bounds }
    }

    pub fn bounds(&self) -> &RegionBounds {
        &self.bounds
    }

    fn violates_region(&self, data: &DataMatrix, model: &Transform, inliers: &[bool]) -> bool {
        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for (row, _) in inliers.iter().enumerate().filter(|(_, b)| **b) {
            let (x, y) = (data[(row, COL_DST_X)], data[(row, COL_DST_Y)]);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if self.bounds.rejects(max_x - min_x, max_y - min_y) {
            return true;
        }
        self.bounds.min_ratio_wh > 0.0 && model.principal_entries().iter().any(|&v| v < 0.0)
    }
}

impl Scoring<Transform> for InlierCountScoring {
    type Score = Score;

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, data: &DataMatrix, model: &Transform, inliers_out: &mut Vec<bool>) -> Score {
        inliers_out.clear();
        let mut inlier_count = 0usize;
        for row in 0..data.nrows() {
            let (u, v) = model.apply(data[(row, COL_SRC_X)], data[(row, COL_SRC_Y)]);
            let dist = (u - data[(row, COL_DST_X)]).hypot(v - data[(row, COL_DST_Y)]);
            let inlier = dist <= self.threshold;
            inliers_out.push(inlier);
            inlier_count += usize::from(inlier);
        }

        if inlier_count > 0 && self.bounds.is_active() && self.violates_region(data, model, inliers_out) {
            inliers_out.iter_mut().for_each(|b| *b = false);
            inlier_count = 0;
        }
        Score::new(inlier_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{point_pairs_from_keypoints, Keypoint};
    use nalgebra::Matrix2x3;

    fn grid_data() -> DataMatrix {
        // Destinations span a 100 x 50 box; the last pair is an outlier.
        let kps = [
            ((0.0, 0.0), (0.0, 0.0)),
            ((100.0, 0.0), (100.0, 0.0)),
            ((0.0, 50.0), (0.0, 50.0)),
            ((100.0, 50.0), (100.0, 50.0)),
            ((10.0, 10.0), (60.0, 30.0)),
        ];
        let pairs: Vec<_> = kps
            .iter()
            .map(|&((sx, sy), (dx, dy))| (Keypoint::at(sx, sy), Keypoint::at(dx, dy)))
            .collect();
        point_pairs_from_keypoints(&pairs)
    }

    #[test]
    fn counts_inliers_within_threshold() {
        let data = grid_data();
        let scoring = InlierCountScoring::new(1.0, RegionBounds::default());
        let mut mask = Vec::new();
        let score = scoring.score(&data, &Transform::Translation { tx: 0.5, ty: 0.0 }, &mut mask);
        assert_eq!(score, Score::new(4));
        assert_eq!(mask, vec![true, true, true, true, false]);
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let data = grid_data();
        let scoring = InlierCountScoring::new(1.0, RegionBounds::default());
        let mut mask = Vec::new();
        let score = scoring.score(&data, &Transform::Translation { tx: 1.0, ty: 0.0 }, &mut mask);
        assert_eq!(score.inlier_count, 4);
    }

    #[test]
    fn region_bounds_zero_the_count() {
        let data = grid_data();
        let identity = Transform::Translation { tx: 0.0, ty: 0.0 };
        let mut mask = Vec::new();

        let wide_enough = RegionBounds {
            min_width: 80.0,
            max_ratio_wh: 3.0,
            ..Default::default()
        };
        let score = InlierCountScoring::new(0.5, wide_enough).score(&data, &identity, &mut mask);
        assert_eq!(score.inlier_count, 4);

        let too_narrow = RegionBounds {
            min_width: 120.0,
            ..Default::default()
        };
        let score = InlierCountScoring::new(0.5, too_narrow).score(&data, &identity, &mut mask);
        assert_eq!(score.inlier_count, 0);
        assert!(mask.iter().all(|&b| !b));

        let too_flat = RegionBounds {
            min_ratio_wh: 2.5,
            ..Default::default()
        };
        let score = InlierCountScoring::new(0.5, too_flat).score(&data, &identity, &mut mask);
        assert_eq!(score.inlier_count, 0);
    }

    #[test]
    fn negative_principal_entries_rejected_with_ratio_bound() {
        let data = grid_data();
        let bounds = RegionBounds {
            min_ratio_wh: 0.5,
            ..Default::default()
        };
        let scoring = InlierCountScoring::new(0.5, bounds);
        let mut mask = Vec::new();

        let identity = Transform::Affine(Matrix2x3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0));
        assert_eq!(scoring.score(&data, &identity, &mut mask).inlier_count, 4);

        let shear = Transform::Affine(Matrix2x3::new(1.0, -1e-9, 0.0, 0.0, 1.0, 0.0));
        assert_eq!(scoring.score(&data, &shear, &mut mask).inlier_count, 0);
    }
}
