//! Sampling strategies for RANSAC trials.

pub mod uniform;

pub use uniform::UniformRandomSampler;
