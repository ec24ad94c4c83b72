//! Example: verifying a near-duplicate frame
//!
//! Builds a synthetic reference frame, derives a re-encoded copy (rescaled,
//! shifted, with perturbed descriptors and extra clutter), round-trips both
//! through the binary record format and runs the pair matcher on them.
//!
//! Usage: `cargo run --example pair_matching -- [MATCHER]`, e.g.
//! `RANSAC,0.8_L2,4_500_2.0_SEED_7`. Set `RUST_LOG=localmatch=debug` for logs.

use localmatch::codec;
use localmatch::*;
use rand::Rng;
use tracing_subscriber::EnvFilter;

const DIM: usize = 32;

fn random_frame(rng: &mut impl Rng, n: usize) -> LocalDescriptorSet {
    let mut set = LocalDescriptorSet::new(n, Datatype::UInt8, DIM);
    for i in 0..n {
        set.set_keypoint(
            i,
            Keypoint::new(
                rng.gen_range(0.0..640.0),
                rng.gen_range(0.0..360.0),
                rng.gen_range(1.0..8.0),
                rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI),
            ),
        );
        let v: Vec<u8> = (0..DIM).map(|_| rng.gen()).collect();
        set.set_vector(i, v.as_slice());
    }
    set
}

/// Copy of `reference` scaled by 0.5 and shifted, plus `clutter` new features.
fn reencoded_copy(rng: &mut impl Rng, reference: &LocalDescriptorSet, clutter: usize) -> LocalDescriptorSet {
    let n = reference.len();
    let mut copy = LocalDescriptorSet::new(n + clutter, Datatype::UInt8, DIM);
    for i in 0..n {
        let Some(kp) = reference.keypoint(i) else {
            continue;
        };
        copy.set_keypoint(
            i,
            Keypoint::new(
                0.5 * kp.x + 20.0 + rng.gen_range(-0.3..0.3),
                0.5 * kp.y + 12.0 + rng.gen_range(-0.3..0.3),
                0.5 * kp.radius,
                kp.angle,
            ),
        );
        let v: Vec<u8> = reference
            .vector_bytes(i)
            .iter()
            .map(|&b| b.saturating_add(rng.gen_range(0..6)))
            .collect();
        copy.set_vector(i, v.as_slice());
    }
    let extra = random_frame(rng, clutter);
    for j in 0..clutter {
        if let Some(kp) = extra.keypoint(j) {
            copy.set_keypoint(n + j, *kp);
        }
        copy.set_vector(n + j, extra.vector_bytes(j));
    }
    copy
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let params = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "RANSAC,0.8_L2,4_500_2.0_SEED_7".to_string());
    println!("=== Pair matching: {params} ===\n");

    let mut rng = rand::thread_rng();
    let reference = random_frame(&mut rng, 150);
    let query = reencoded_copy(&mut rng, &reference, 60);

    // persist both frames in one blob and read them back
    let mut blob = Vec::new();
    codec::serialize(&query, &mut blob);
    codec::serialize(&reference, &mut blob);
    let frames = codec::decode_all(&blob)?;
    println!("{} records, {} bytes", frames.len(), blob.len());

    let mut matcher: PairMatcher = params.parse()?;
    let count = matcher.compute_matches(&frames[0], &frames[1])?;
    println!("basic matches: {}", matcher.basic().num_matches());
    println!("result:        {count}");

    let result = matcher.last_matches_and_model();
    if let Some(transform) = result.transform {
        println!("model:         {transform}");
    }
    match result.matrix {
        Some(TransformMatrix::Affine(m)) => println!("affine matrix:{m}"),
        Some(TransformMatrix::Perspective(m)) => println!("homography:{m}"),
        None => {}
    }
    let wrong = result
        .matches
        .iter()
        .filter(|c| c.query_index != c.reference_index)
        .count();
    println!("mismatched correspondences kept: {wrong}");
    Ok(())
}
