//! Core shared types: keypoints, correspondences and the point-pair matrix
//! consumed by the estimators.

use nalgebra::DMatrix;

use crate::descriptors::LocalDescriptorSet;

/// Dynamic matrix of `f64` holding one correspondence per row.
///
/// Rows built by [`point_pairs`] use the column layout
/// `[x_src, y_src, radius_src, x_dst, y_dst, radius_dst]`, see the `COL_*`
/// constants.
pub type DataMatrix = DMatrix<f64>;

pub const COL_SRC_X: usize = 0;
pub const COL_SRC_Y: usize = 1;
pub const COL_SRC_RADIUS: usize = 2;
pub const COL_DST_X: usize = 3;
pub const COL_DST_Y: usize = 4;
pub const COL_DST_RADIUS: usize = 5;
pub const POINT_PAIR_COLS: usize = 6;

/// Detected salient location with position, scale and orientation.
///
/// `radius == 0` means the detector did not report a scale. `angle` is in
/// radians within `[-π, π]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub angle: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, radius: f64, angle: f64) -> Self {
        Self {
            x,
            y,
            radius,
            angle,
        }
    }

    /// Keypoint with position only.
    pub fn at(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0, 0.0)
    }
}

/// Hypothesized pairing between one query feature and one reference feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub query_index: usize,
    pub reference_index: usize,
    /// Distance to the nearest reference vector, when known.
    pub rank1_dist: Option<f64>,
    /// Distance to the second-nearest reference vector, when known.
    pub rank2_dist: Option<f64>,
}

impl Correspondence {
    pub fn new(query_index: usize, reference_index: usize) -> Self {
        Self {
            query_index,
            reference_index,
            rank1_dist: None,
            rank2_dist: None,
        }
    }

    pub fn with_distances(mut self, rank1: Option<f64>, rank2: Option<f64>) -> Self {
        self.rank1_dist = rank1;
        self.rank2_dist = rank2;
        self
    }
}

/// Ordered correspondences between one (query, reference) descriptor pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceSet {
    matches: Vec<Correspondence>,
}

impl CorrespondenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            matches: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, correspondence: Correspondence) {
        self.matches.push(correspondence);
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Correspondence> {
        self.matches.get(pos)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Correspondence> {
        self.matches.iter()
    }

    pub fn as_slice(&self) -> &[Correspondence] {
        &self.matches
    }

    /// `(query_index, reference_index)` pairs in order.
    pub fn index_pairs(&self) -> Vec<(usize, usize)> {
        self.matches
            .iter()
            .map(|c| (c.query_index, c.reference_index))
            .collect()
    }
}

impl From<Vec<Correspondence>> for CorrespondenceSet {
    fn from(matches: Vec<Correspondence>) -> Self {
        Self { matches }
    }
}

impl FromIterator<Correspondence> for CorrespondenceSet {
    fn from_iter<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        Self {
            matches: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CorrespondenceSet {
    type Item = &'a Correspondence;
    type IntoIter = std::slice::Iter<'a, Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Gather the keypoints of every correspondence into a point-pair matrix.
///
/// Returns `None` when a correspondence refers to a keypoint outside either
/// set.
pub fn point_pairs(
    query: &LocalDescriptorSet,
    reference: &LocalDescriptorSet,
    matches: &CorrespondenceSet,
) -> Option<DataMatrix> {
    let mut data = DataMatrix::zeros(matches.len(), POINT_PAIR_COLS);
    for (row, c) in matches.iter().enumerate() {
        let src = query.keypoint(c.query_index)?;
        let dst = reference.keypoint(c.reference_index)?;
        data[(row, COL_SRC_X)] = src.x;
        data[(row, COL_SRC_Y)] = src.y;
        data[(row, COL_SRC_RADIUS)] = src.radius;
        data[(row, COL_DST_X)] = dst.x;
        data[(row, COL_DST_Y)] = dst.y;
        data[(row, COL_DST_RADIUS)] = dst.radius;
    }
    Some(data)
}

/// Build a point-pair matrix directly from `(src, dst)` keypoints.
pub fn point_pairs_from_keypoints(pairs: &[(Keypoint, Keypoint)]) -> DataMatrix {
    let mut data = DataMatrix::zeros(pairs.len(), POINT_PAIR_COLS);
    for (row, (src, dst)) in pairs.iter().enumerate() {
        data[(row, COL_SRC_X)] = src.x;
        data[(row, COL_SRC_Y)] = src.y;
        data[(row, COL_SRC_RADIUS)] = src.radius;
        data[(row, COL_DST_X)] = dst.x;
        data[(row, COL_DST_Y)] = dst.y;
        data[(row, COL_DST_RADIUS)] = dst.radius;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{Datatype, LocalDescriptorSet};

    #[test]
    fn point_pairs_follow_correspondence_order() {
        let mut q = LocalDescriptorSet::new(2, Datatype::UInt8, 1);
        let mut r = LocalDescriptorSet::new(2, Datatype::UInt8, 1);
        q.set_keypoint(0, Keypoint::new(1.0, 2.0, 3.0, 0.0));
        q.set_keypoint(1, Keypoint::new(4.0, 5.0, 6.0, 0.0));
        r.set_keypoint(0, Keypoint::new(7.0, 8.0, 9.0, 0.0));
        r.set_keypoint(1, Keypoint::new(10.0, 11.0, 12.0, 0.0));

        let matches: CorrespondenceSet =
            vec![Correspondence::new(1, 0), Correspondence::new(0, 1)].into();
        let data = point_pairs(&q, &r, &matches).unwrap();

        assert_eq!(data.nrows(), 2);
        assert_eq!(data[(0, COL_SRC_X)], 4.0);
        assert_eq!(data[(0, COL_DST_RADIUS)], 9.0);
        assert_eq!(data[(1, COL_SRC_Y)], 2.0);
        assert_eq!(data[(1, COL_DST_X)], 10.0);
    }

    #[test]
    fn point_pairs_reject_out_of_range_indices() {
        let q = LocalDescriptorSet::new(1, Datatype::UInt8, 1);
        let r = LocalDescriptorSet::new(1, Datatype::UInt8, 1);
        let matches: CorrespondenceSet = vec![Correspondence::new(0, 3)].into();
        assert!(point_pairs(&q, &r, &matches).is_none());
    }
}
