//! Basic matching optionally followed by RANSAC verification.

use std::str::FromStr;

use crate::descriptors::LocalDescriptorSet;
use crate::error::{ConfigError, ConfigResult, MatchResult};
use crate::matcher::BasicMatcher;
use crate::models::{Transform, TransformMatrix};
use crate::ransac::RansacController;
use crate::settings::PairMatcherSettings;
use crate::types::CorrespondenceSet;

/// Result of the last [`PairMatcher::compute_matches`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchesAndModel {
    pub matches: CorrespondenceSet,
    /// Set when RANSAC is configured and found a model.
    pub transform: Option<Transform>,
    /// Set for affine and perspective models.
    pub matrix: Option<TransformMatrix>,
}

/// Matches a query set against a reference set.
///
/// ```
/// use localmatch::PairMatcher;
///
/// let matcher: PairMatcher = "RANSAC,0.8_L2,4_300_2.5".parse().unwrap();
/// assert!(matcher.ransac().is_some());
/// ```
pub struct PairMatcher {
    basic: BasicMatcher,
    ransac: Option<RansacController>,
}

impl PairMatcher {
    pub fn new(settings: PairMatcherSettings) -> ConfigResult<Self> {
        Ok(match settings {
            PairMatcherSettings::Match(basic) => Self {
                basic: BasicMatcher::new(basic),
                ransac: None,
            },
            PairMatcherSettings::Ransac(basic, ransac) => Self {
                basic: BasicMatcher::new(basic),
                ransac: Some(RansacController::new(ransac)?),
            },
        })
    }

    pub fn basic(&self) -> &BasicMatcher {
        &self.basic
    }

    pub fn ransac(&self) -> Option<&RansacController> {
        self.ransac.as_ref()
    }

    /// Number of matches between `query` and `reference`: RANSAC inliers when
    /// configured, basic matches otherwise.
    ///
    /// Binds `reference` for the duration of the call.
    pub fn compute_matches(
        &mut self,
        query: &LocalDescriptorSet,
        reference: &LocalDescriptorSet,
    ) -> MatchResult<usize> {
        self.basic.set_reference_set(reference)?;
        let computed = self.basic.compute_matches(query);
        self.basic.unset_reference_set();
        let num_matches = computed?;

        let Some(ransac) = self.ransac.as_mut() else {
            return Ok(num_matches);
        };
        if num_matches == 0 {
            ransac.reset();
            return Ok(0);
        }
        Ok(ransac.compute_matches(query, reference, &self.basic.last_matches()))
    }

    /// RANSAC's inliers and model when configured, otherwise the basic
    /// matches.
    pub fn last_matches_and_model(&self) -> MatchesAndModel {
        match &self.ransac {
            None => MatchesAndModel {
                matches: self.basic.last_matches(),
                ..Default::default()
            },
            Some(ransac) => ransac
                .last_model()
                .map(|outcome| MatchesAndModel {
                    matches: outcome.matches,
                    transform: Some(outcome.transform),
                    matrix: outcome.matrix,
                })
                .unwrap_or_default(),
        }
    }
}

impl FromStr for PairMatcher {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.parse()?)
    }
}
