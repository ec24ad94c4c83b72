//! Parallel trial blocks must reproduce the single-threaded result.
#![cfg(feature = "rayon")]

use localmatch::*;
use rand::prelude::*;

fn noisy_translation(seed: u64) -> (LocalDescriptorSet, LocalDescriptorSet, CorrespondenceSet) {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = 60;
    let mut query = LocalDescriptorSet::new(n, Datatype::Float32, 4);
    let mut reference = LocalDescriptorSet::new(n, Datatype::Float32, 4);
    for i in 0..n {
        let (x, y) = (rng.gen_range(0.0..320.0), rng.gen_range(0.0..240.0));
        let (u, v) = if i % 3 == 0 {
            (rng.gen_range(0.0..320.0), rng.gen_range(0.0..240.0))
        } else {
            (x - 12.0 + rng.gen_range(-0.3..0.3), y + 4.0 + rng.gen_range(-0.3..0.3))
        };
        query.set_keypoint(i, Keypoint::at(x, y));
        reference.set_keypoint(i, Keypoint::at(u, v));
        let vector: Vec<f32> = (0..4).map(|_| rng.gen_range(0.0..1.0)).collect();
        query.set_vector(i, vector.as_slice());
        reference.set_vector(i, vector.as_slice());
    }
    let matches = (0..n).map(|i| Correspondence::new(i, i)).collect();
    (query, reference, matches)
}

fn run(settings: &str, data: &(LocalDescriptorSet, LocalDescriptorSet, CorrespondenceSet)) -> (usize, Option<RansacOutcome>) {
    let mut ransac: RansacController = settings.parse().unwrap();
    let count = ransac.compute_matches(&data.0, &data.1, &data.2);
    (count, ransac.last_model())
}

#[test]
fn test_parallel_blocks_match_single_thread() {
    let settings = "1_400_0.5_SEED_21_WORKERS_4";
    for seed in [1, 2, 3] {
        let data = noisy_translation(seed);
        let parallel = run(settings, &data);
        let single = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| run(settings, &data));
        assert!(parallel.0 > 0);
        assert_eq!(parallel, single);
    }
}

#[test]
fn test_parallel_knn_matches_sequential() {
    let (query, reference, _) = noisy_translation(9);
    let index = LinearScanIndex::build(&reference, Distance::L1);
    let queries = query.vectors_f64();
    assert_eq!(
        index.query_batch(&queries, 2, None, 4),
        index.query_batch(&queries, 2, None, 1)
    );
}
