//! # localmatch - Local-feature pair matching with RANSAC verification
//!
//! `localmatch` confirms near-duplicate frames: it matches the local features
//! of a query frame against a reference frame by nearest-neighbor search and
//! a ratio test, then keeps only the correspondences consistent with one of
//! five transform families fitted by RANSAC.
//!
//! ## Quick Start
//!
//! ```rust
//! use localmatch::{Datatype, Keypoint, LocalDescriptorSet, PairMatcher};
//!
//! let mut reference = LocalDescriptorSet::new(3, Datatype::UInt8, 3);
//! let mut query = LocalDescriptorSet::new(3, Datatype::UInt8, 3);
//! for (i, (x, y)) in [(0.0, 0.0), (20.0, 0.0), (0.0, 20.0)].into_iter().enumerate() {
//!     let mut v = [0u8; 3];
//!     v[i] = 200;
//!     reference.set_keypoint(i, Keypoint::at(x, y));
//!     reference.set_vector(i, &v);
//!     query.set_keypoint(i, Keypoint::at(x + 7.0, y - 2.0));
//!     query.set_vector(i, &v);
//! }
//!
//! // translation model, 100 trials, 0.5px inlier threshold
//! let mut matcher: PairMatcher = "RANSAC,0.8_L2,1_100_0.5_SEED_1".parse().unwrap();
//! let inliers = matcher.compute_matches(&query, &reference).unwrap();
//! assert_eq!(inliers, 3);
//! println!("{:?}", matcher.last_matches_and_model().transform);
//! ```
//!
//! ## Construction strings
//!
//! - basic matcher: `<ratio2NN>_<distance>[_<rangeNN>]`, e.g. `0.8_L2`
//! - RANSAC: `<model:1..5>_<numCycles>_<distMaxInliers>[_OPTIONS]`, e.g.
//!   `4_300_2.5_CORRECTION`; see [`settings`]
//! - pair matcher: `MATCH,<basic>` or `RANSAC,<basic>,<ransac>`
//!
//! Model codes: 1 translation, 2 SIFT scale, 3 free scale, 4 affine,
//! 5 perspective.
//!
//! ## Extending
//!
//! The RANSAC loop is built from the traits in [`core`]. A different k-NN
//! backend plugs in through [`NearestNeighborIndex`] and
//! [`BasicMatcher::set_reference_index`].
//!
//! ## Modules
//!
//! - **[`descriptors`]**, **[`codec`]**, **[`store`]**: feature sets and their binary records
//! - **[`index`]**, **[`matcher`]**: nearest-neighbor candidate matching
//! - **[`core`]**, **[`estimators`]**, **[`samplers`]**, **[`scoring`]**, **[`optimisers`]**: RANSAC building blocks
//! - **[`ransac`]**, **[`pair_matcher`]**: the verifier and the façade
//! - **[`settings`]**: configuration types and construction grammars

pub mod codec;
pub mod core;
pub mod descriptors;
pub mod error;
pub mod estimators;
pub mod index;
pub mod matcher;
pub mod models;
pub mod optimisers;
pub mod pair_matcher;
pub mod ransac;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::core::{Estimator, LocalOptimizer, Sampler, Scoring};
pub use descriptors::{Datatype, LocalDescriptorSet};
pub use error::{ConfigError, DecodeError, MatchError, StoreError};
pub use index::{Distance, LinearScanIndex, NearestNeighborIndex};
pub use matcher::BasicMatcher;
pub use models::{FittedModel, ModelType, Transform, TransformMatrix};
pub use pair_matcher::{MatchesAndModel, PairMatcher};
pub use ransac::{RansacController, RansacOutcome};
pub use settings::{BasicMatcherSettings, PairMatcherSettings, RansacSettings};
pub use store::{DescriptorStore, DescriptorWriter, StoreLayout};
pub use types::{Correspondence, CorrespondenceSet, Keypoint};
