//! Candidate correspondences by nearest-neighbor search and ratio test.

use tracing::{debug, info};

use crate::descriptors::LocalDescriptorSet;
use crate::error::{MatchError, MatchResult};
use crate::index::{LinearScanIndex, NearestNeighborIndex};
use crate::settings::BasicMatcherSettings;
use crate::types::{Correspondence, CorrespondenceSet};

/// 1-NN / 2-NN matcher against an explicitly bound reference set.
///
/// Only the per-query accept/reject decisions of the last call are kept;
/// [`BasicMatcher::last_matches`] builds the correspondences from them.
pub struct BasicMatcher {
    settings: BasicMatcherSettings,
    reference: Option<Box<dyn NearestNeighborIndex + Send>>,
    decisions: Vec<Option<Correspondence>>,
    num_matches: usize,
    /// Built on the first multi-threaded search and reused afterwards.
    #[cfg(feature = "rayon")]
    pool: Option<rayon::ThreadPool>,
}

impl BasicMatcher {
    pub fn new(settings: BasicMatcherSettings) -> Self {
        info!(
            ratio_2nn = settings.ratio_2nn,
            distance = %settings.distance,
            range_nn = settings.range_nn,
            "basic matcher configured"
        );
        Self {
            settings,
            reference: None,
            decisions: Vec::new(),
            num_matches: 0,
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    pub fn settings(&self) -> &BasicMatcherSettings {
        &self.settings
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Index `reference` with a [`LinearScanIndex`] and bind it.
    pub fn set_reference_set(&mut self, reference: &LocalDescriptorSet) -> MatchResult<()> {
        let index = LinearScanIndex::build(reference, self.settings.distance);
        self.set_reference_index(Box::new(index))
    }

    /// Bind an externally built index.
    pub fn set_reference_index(
        &mut self,
        index: Box<dyn NearestNeighborIndex + Send>,
    ) -> MatchResult<()> {
        if self.reference.is_some() {
            return Err(MatchError::ReferenceAlreadyBound);
        }
        self.reference = Some(index);
        Ok(())
    }

    pub fn unset_reference_set(&mut self) {
        self.reference = None;
    }

    #[cfg(feature = "rayon")]
    fn ensure_pool(&mut self) {
        if self.pool.is_some() || self.settings.num_threads <= 1 {
            return;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.num_threads)
            .build()
        {
            Ok(pool) => self.pool = Some(pool),
            Err(err) => tracing::warn!(%err, "using the global rayon pool"),
        }
    }

    /// Match every query vector against the bound reference; returns the
    /// number of accepted correspondences.
    ///
    /// An empty query returns 0 whether or not a reference is bound.
    pub fn compute_matches(&mut self, query: &LocalDescriptorSet) -> MatchResult<usize> {
        self.decisions.clear();
        self.num_matches = 0;
        if query.is_empty() {
            return Ok(0);
        }
        #[cfg(feature = "rayon")]
        self.ensure_pool();
        let index = self.reference.as_deref().ok_or(MatchError::NoReference)?;
        if index.is_empty() {
            return Ok(0);
        }
        if query.dimension() != index.dimension() {
            return Err(MatchError::DimensionMismatch {
                query: query.dimension(),
                reference: index.dimension(),
            });
        }

        let range = (self.settings.range_nn > 0.0).then_some(self.settings.range_nn);
        let queries = query.vectors_f64();
        let num_threads = self.settings.num_threads;
        #[cfg(feature = "rayon")]
        let neighbors = match self.pool.as_ref() {
            Some(pool) => pool.install(|| index.query_batch(&queries, 2, range, num_threads)),
            None => index.query_batch(&queries, 2, range, num_threads),
        };
        #[cfg(not(feature = "rayon"))]
        let neighbors = index.query_batch(&queries, 2, range, num_threads);
        let ratio_test = self.settings.ratio_test_enabled();

        self.decisions.reserve(neighbors.len());
        for (query_index, nn) in neighbors.iter().enumerate() {
            let decision = match nn.as_slice() {
                [first, second, ..] if ratio_test => {
                    // 0 / 0 is NaN and fails, so equidistant duplicates are rejected
                    (first.distance / second.distance <= self.settings.ratio_2nn).then(|| {
                        Correspondence::new(query_index, first.index)
                            .with_distances(Some(first.distance), Some(second.distance))
                    })
                }
                _ if ratio_test => None,
                [first, rest @ ..] => Some(
                    Correspondence::new(query_index, first.index)
                        .with_distances(Some(first.distance), rest.first().map(|n| n.distance)),
                ),
                [] => None,
            };
            self.num_matches += usize::from(decision.is_some());
            self.decisions.push(decision);
        }

        debug!(
            queries = query.len(),
            matches = self.num_matches,
            "basic matcher"
        );
        Ok(self.num_matches)
    }

    /// Number of matches accepted by the last call.
    pub fn num_matches(&self) -> usize {
        self.num_matches
    }

    /// Correspondences accepted by the last call, in query order.
    pub fn last_matches(&self) -> CorrespondenceSet {
        self.decisions.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::Datatype;
    use crate::index::Distance;

    fn set(vectors: &[[f32; 2]]) -> LocalDescriptorSet {
        let mut set = LocalDescriptorSet::new(vectors.len(), Datatype::Float32, 2);
        for (i, v) in vectors.iter().enumerate() {
            set.set_vector(i, v);
        }
        set
    }

    fn settings(ratio: f64, range: f64) -> BasicMatcherSettings {
        BasicMatcherSettings {
            ratio_2nn: ratio,
            distance: Distance::L2,
            range_nn: range,
            num_threads: 1,
        }
    }

    #[test]
    fn binding_is_explicit() {
        let reference = set(&[[0.0, 0.0]]);
        let mut matcher = BasicMatcher::new(settings(1.0, 0.0));
        assert_eq!(
            matcher.compute_matches(&reference),
            Err(MatchError::NoReference)
        );
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(
            matcher.set_reference_set(&reference),
            Err(MatchError::ReferenceAlreadyBound)
        );
        matcher.unset_reference_set();
        assert!(matcher.set_reference_set(&reference).is_ok());
    }

    #[test]
    fn ratio_test_filters_ambiguous_queries() {
        let reference = set(&[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]]);
        // q0 is close to r0 only; q1 is halfway between r0 and r1.
        let query = set(&[[0.5, 0.0], [5.0, 0.0]]);

        let mut matcher = BasicMatcher::new(settings(0.8, 0.0));
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(matcher.compute_matches(&query).unwrap(), 1);
        let matches = matcher.last_matches();
        assert_eq!(matches.index_pairs(), vec![(0, 0)]);
        assert_eq!(matches.get(0).unwrap().rank1_dist, Some(0.5));
        assert_eq!(matches.get(0).unwrap().rank2_dist, Some(9.5));

        let mut matcher = BasicMatcher::new(settings(1.0, 0.0));
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(matcher.compute_matches(&query).unwrap(), 2);
    }

    #[test]
    fn ratio_test_needs_two_neighbors() {
        let reference = set(&[[0.0, 0.0]]);
        let query = set(&[[0.1, 0.0]]);
        let mut matcher = BasicMatcher::new(settings(0.9, 0.0));
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(matcher.compute_matches(&query).unwrap(), 0);
        assert!(matcher.last_matches().is_empty());
    }

    #[test]
    fn duplicate_references_are_ambiguous() {
        let reference = set(&[[1.0, 1.0], [1.0, 1.0], [8.0, 8.0]]);
        let query = set(&[[1.0, 1.0], [7.5, 8.0]]);
        let mut matcher = BasicMatcher::new(settings(0.8, 0.0));
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(matcher.compute_matches(&query).unwrap(), 1);
        assert_eq!(matcher.last_matches().index_pairs(), vec![(1, 2)]);
    }

    #[test]
    fn range_limits_candidates() {
        let reference = set(&[[0.0, 0.0], [10.0, 0.0]]);
        let query = set(&[[1.0, 0.0], [50.0, 50.0]]);
        let mut matcher = BasicMatcher::new(settings(1.0, 2.0));
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(matcher.compute_matches(&query).unwrap(), 1);
        assert_eq!(matcher.last_matches().index_pairs(), vec![(0, 0)]);
    }

    #[test]
    fn empty_sets_short_circuit() {
        let reference = set(&[[0.0, 0.0]]);
        let mut matcher = BasicMatcher::new(settings(1.0, 0.0));
        assert_eq!(matcher.compute_matches(&LocalDescriptorSet::empty()).unwrap(), 0);
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(matcher.compute_matches(&LocalDescriptorSet::empty()).unwrap(), 0);

        matcher.unset_reference_set();
        matcher.set_reference_set(&LocalDescriptorSet::empty()).unwrap();
        assert_eq!(matcher.compute_matches(&reference).unwrap(), 0);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let reference = set(&[[0.0, 0.0]]);
        let query = LocalDescriptorSet::new(1, Datatype::Float32, 3);
        let mut matcher = BasicMatcher::new(settings(1.0, 0.0));
        matcher.set_reference_set(&reference).unwrap();
        assert_eq!(
            matcher.compute_matches(&query),
            Err(MatchError::DimensionMismatch {
                query: 3,
                reference: 2
            })
        );
    }

    #[test]
    fn threaded_search_matches_single_thread() {
        let reference = set(&[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0]]);
        let query = set(&[[1.0, 0.0], [9.0, 9.5], [5.0, 5.0], [0.0, 8.0]]);
        let mut single = BasicMatcher::new(settings(0.9, 0.0));
        let mut threaded = BasicMatcher::new(BasicMatcherSettings {
            num_threads: 3,
            ..settings(0.9, 0.0)
        });
        single.set_reference_set(&reference).unwrap();
        threaded.set_reference_set(&reference).unwrap();
        for _ in 0..2 {
            assert_eq!(
                threaded.compute_matches(&query).unwrap(),
                single.compute_matches(&query).unwrap()
            );
            assert_eq!(threaded.last_matches(), single.last_matches());
        }
    }

    #[test]
    fn each_call_replaces_the_last_result() {
        let reference = set(&[[0.0, 0.0], [10.0, 0.0]]);
        let mut matcher = BasicMatcher::new(settings(1.0, 0.0));
        matcher.set_reference_set(&reference).unwrap();
        matcher.compute_matches(&set(&[[9.0, 0.0], [1.0, 0.0]])).unwrap();
        assert_eq!(matcher.last_matches().len(), 2);
        matcher.compute_matches(&set(&[[1.0, 0.0]])).unwrap();
        assert_eq!(matcher.last_matches().index_pairs(), vec![(0, 0)]);
    }
}
