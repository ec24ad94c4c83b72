//! k-nearest-neighbor queries over reference vectors.
//!
//! [`NearestNeighborIndex`] is the contract the matcher consumes; any index
//! returning neighbors ascending by distance can be plugged in.
//! [`LinearScanIndex`] is the exact brute-force implementation used by
//! default.

use std::fmt;
use std::str::FromStr;

use ordered_float::OrderedFloat;

use crate::descriptors::LocalDescriptorSet;
use crate::error::ConfigError;

/// Vector distance used to rank neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Distance {
    L1,
    #[default]
    L2,
    L2Squared,
    LMax,
    Chi2,
}

impl Distance {
    pub const ALL: [Distance; 5] = [
        Distance::L1,
        Distance::L2,
        Distance::L2Squared,
        Distance::LMax,
        Distance::Chi2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Distance::L1 => "L1",
            Distance::L2 => "L2",
            Distance::L2Squared => "L2SQUARED",
            Distance::LMax => "LMAX",
            Distance::Chi2 => "CHI2",
        }
    }

    /// Distance between two vectors of equal length.
    pub fn eval(self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        let pairs = a.iter().zip(b);
        match self {
            Distance::L1 => pairs.map(|(x, y)| (x - y).abs()).sum(),
            Distance::L2 => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            Distance::L2Squared => pairs.map(|(x, y)| (x - y) * (x - y)).sum(),
            Distance::LMax => pairs.map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
            Distance::Chi2 => pairs
                .map(|(x, y)| {
                    let avg = (x + y) / 2.0;
                    if avg > 0.0 {
                        (x - avg) * (x - avg) / avg
                    } else {
                        0.0
                    }
                })
                .sum(),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Distance {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownDistance(s.to_string()))
    }
}

/// One query result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// k-NN contract consumed by the basic matcher.
pub trait NearestNeighborIndex: Sync {
    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the indexed vectors.
    fn dimension(&self) -> usize;

    /// Up to `k` neighbors of `vector`, ascending by distance, optionally
    /// restricted to `distance <= range`.
    fn query(&self, vector: &[f64], k: usize, range: Option<f64>) -> Vec<Neighbor>;

    /// Answer one query per row of `queries` (row-major, `dimension()` wide).
    ///
    /// `num_threads` is advisory.
    fn query_batch(
        &self,
        queries: &[f64],
        k: usize,
        range: Option<f64>,
        num_threads: usize,
    ) -> Vec<Vec<Neighbor>> {
        let _ = num_threads;
        let dim = self.dimension().max(1);
        queries
            .chunks_exact(dim)
            .map(|q| self.query(q, k, range))
            .collect()
    }
}

/// Exact index scanning every reference vector.
#[derive(Debug, Clone)]
pub struct LinearScanIndex {
    distance: Distance,
    dimension: usize,
    vectors: Vec<f64>,
}

impl LinearScanIndex {
    pub fn build(set: &LocalDescriptorSet, distance: Distance) -> Self {
        Self {
            distance,
            dimension: set.dimension(),
            vectors: set.vectors_f64(),
        }
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    fn vector(&self, index: usize) -> &[f64] {
        &self.vectors[index * self.dimension..(index + 1) * self.dimension]
    }
}

/// Insert into an ascending list capped at `k` entries; ties keep the lower
/// index first.
fn push_bounded(best: &mut Vec<Neighbor>, candidate: Neighbor, k: usize) {
    let key = |n: &Neighbor| (OrderedFloat(n.distance), n.index);
    let pos = best.partition_point(|n| key(n) <= key(&candidate));
    if pos >= k {
        return;
    }
    best.insert(pos, candidate);
    best.truncate(k);
}

impl NearestNeighborIndex for LinearScanIndex {
    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn query(&self, vector: &[f64], k: usize, range: Option<f64>) -> Vec<Neighbor> {
        let mut best = Vec::with_capacity(k + 1);
        if k == 0 || vector.len() != self.dimension {
            return best;
        }
        for index in 0..self.len() {
            let distance = self.distance.eval(vector, self.vector(index));
            if range.is_some_and(|r| distance > r) || distance.is_nan() {
                continue;
            }
            push_bounded(&mut best, Neighbor { index, distance }, k);
        }
        best
    }

    /// Runs on the current rayon pool when `num_threads > 1`; callers pick
    /// the pool with `ThreadPool::install`.
    #[cfg(feature = "rayon")]
    fn query_batch(
        &self,
        queries: &[f64],
        k: usize,
        range: Option<f64>,
        num_threads: usize,
    ) -> Vec<Vec<Neighbor>> {
        use rayon::prelude::*;

        let dim = self.dimension.max(1);
        if num_threads <= 1 {
            return queries
                .chunks_exact(dim)
                .map(|q| self.query(q, k, range))
                .collect();
        }
        queries
            .par_chunks_exact(dim)
            .map(|q| self.query(q, k, range))
            .collect()
    }
}
