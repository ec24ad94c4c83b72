//! Configuration types and their construction-string grammars.
//!
//! - basic matcher: `<ratio2NN>_<distance>[_<rangeNN>]`, e.g. `0.8_L2`
//! - RANSAC: `<model:1..5>_<numCycles>_<distMaxInliers>[_MINMATCHES_<n>][_CORRECTION]
//!   [_MINWIDTH_<w>][_MAXWIDTH_<w>][_MINHEIGHT_<h>][_MAXHEIGHT_<h>][_MINRATIOWH_<r>]
//!   [_MAXRATIOWH_<r>][_SEED_<u64>][_WORKERS_<n>][_LOOSESCALE]`
//! - pair matcher: `MATCH,<basic>` or `RANSAC,<basic>,<ransac>`
//!
//! The ratio and the region bounds accept fractions such as `16/9`. Every `Display` impl
//! re-emits a string its `FromStr` accepts.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::index::Distance;
use crate::models::ModelType;
use crate::scoring::RegionBounds;
use crate::utils::Tokenizer;

const BASIC_FORMAT: &str = "<ratio2NN>_<distance>[_<rangeNN>]  e.g. 0.8_L2";
const RANSAC_FORMAT: &str = "(modelType:1..5)_numCycles_distMaxInliers_[opt:MINMATCHES_num]_[opt:CORRECTION]_[opt:MINWIDTH_w]_[opt:MAXWIDTH_w]_[opt:MINHEIGHT_h]_[opt:MAXHEIGHT_h]_[opt:MINRATIOWH_r]_[opt:MAXRATIOWH_r]_[opt:SEED_s]_[opt:WORKERS_n]_[opt:LOOSESCALE]  e.g. 4_300_2.5_CORRECTION";
const PAIR_FORMAT: &str = "MATCH,<basic> or RANSAC,<basic>,<ransac>  e.g. RANSAC,0.8_L2,2_300_2.5";

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Nearest-neighbor candidate matching.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicMatcherSettings {
    /// Ratio-test threshold `dist1/dist2`; `>= 1` accepts the nearest neighbor outright.
    pub ratio_2nn: f64,
    pub distance: Distance,
    /// Search radius; `0` is unrestricted.
    pub range_nn: f64,
    /// Advisory thread count handed to the index.
    pub num_threads: usize,
}

impl Default for BasicMatcherSettings {
    fn default() -> Self {
        Self {
            ratio_2nn: 1.0,
            distance: Distance::L2,
            range_nn: 0.0,
            num_threads: default_threads(),
        }
    }
}

impl BasicMatcherSettings {
    pub fn ratio_test_enabled(&self) -> bool {
        self.ratio_2nn < 1.0
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.ratio_2nn > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "ratio2NN",
                value: self.ratio_2nn,
            });
        }
        if !(self.range_nn >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "rangeNN",
                value: self.range_nn,
            });
        }
        Ok(())
    }
}

impl FromStr for BasicMatcherSettings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tk = Tokenizer::new(s, '_');
        if !tk.has_next() {
            return Err(ConfigError::Empty {
                expected: BASIC_FORMAT,
            });
        }
        let mut settings = Self {
            ratio_2nn: tk.next_fraction("ratio2NN")?,
            distance: tk.next_token("distance")?.parse()?,
            ..Self::default()
        };
        if tk.has_next() {
            settings.range_nn = tk.next_f64("rangeNN")?;
        }
        tk.finish()?;
        settings.validate()?;
        Ok(settings)
    }
}

impl fmt::Display for BasicMatcherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.ratio_2nn, self.distance)?;
        if self.range_nn > 0.0 {
            write!(f, "_{}", self.range_nn)?;
        }
        Ok(())
    }
}

/// RANSAC verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacSettings {
    pub model_type: ModelType,
    /// Fixed trial budget.
    pub num_cycles: usize,
    /// Inlier threshold in pixels.
    pub dist_max_inliers: f64,
    /// Minimum matches; raised to the model's minimal sample size.
    pub min_matches: usize,
    /// Least-squares refinement (scale families only).
    pub correction: bool,
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub min_ratio_wh: f64,
    pub max_ratio_wh: f64,
    /// Near-isotropic gate for the free-scale family.
    pub strict_scale: bool,
    /// Root seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Trials are split into this many contiguous chunks.
    pub num_workers: usize,
}

impl Default for RansacSettings {
    fn default() -> Self {
        Self {
            model_type: ModelType::Perspective,
            num_cycles: 300,
            dist_max_inliers: 2.5,
            min_matches: ModelType::Perspective.min_samples(),
            correction: false,
            min_width: 0.0,
            max_width: 0.0,
            min_height: 0.0,
            max_height: 0.0,
            min_ratio_wh: 0.0,
            max_ratio_wh: 0.0,
            strict_scale: true,
            seed: None,
            num_workers: 1,
        }
    }
}

impl RansacSettings {
    pub fn new(model_type: ModelType, num_cycles: usize, dist_max_inliers: f64) -> Self {
        Self {
            model_type,
            num_cycles,
            dist_max_inliers,
            min_matches: model_type.min_samples(),
            ..Self::default()
        }
    }

    /// `max(min_matches, minimal sample size)`.
    pub fn effective_min_matches(&self) -> usize {
        self.min_matches.max(self.model_type.min_samples())
    }

    pub fn region_bounds(&self) -> RegionBounds {
        RegionBounds {
            min_width: self.min_width,
            max_width: self.max_width,
            min_height: self.min_height,
            max_height: self.max_height,
            min_ratio_wh: self.min_ratio_wh,
            max_ratio_wh: self.max_ratio_wh,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.dist_max_inliers >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "distMaxInliers",
                value: self.dist_max_inliers,
            });
        }
        if self.num_workers == 0 {
            return Err(ConfigError::OutOfRange {
                field: "WORKERS",
                value: 0.0,
            });
        }
        let bounds = [
            ("MINWIDTH", self.min_width),
            ("MAXWIDTH", self.max_width),
            ("MINHEIGHT", self.min_height),
            ("MAXHEIGHT", self.max_height),
            ("MINRATIOWH", self.min_ratio_wh),
            ("MAXRATIOWH", self.max_ratio_wh),
        ];
        for (field, value) in bounds {
            if !(value >= 0.0) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}

impl FromStr for RansacSettings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tk = Tokenizer::new(s, '_');
        if !tk.has_next() {
            return Err(ConfigError::Empty {
                expected: RANSAC_FORMAT,
            });
        }
        let model_type = ModelType::from_code(tk.next_int("modelType")?)?;
        let mut settings = Self::new(
            model_type,
            tk.next_int("numCycles")?,
            tk.next_f64("distMaxInliers")?,
        );
        while tk.has_next() {
            if tk.is_next("MINMATCHES") {
                settings.min_matches = tk.next_int("MINMATCHES")?;
            } else if tk.is_next("CORRECTION") {
                settings.correction = true;
            } else if tk.is_next("MINWIDTH") {
                settings.min_width = tk.next_fraction("MINWIDTH")?;
            } else if tk.is_next("MAXWIDTH") {
                settings.max_width = tk.next_fraction("MAXWIDTH")?;
            } else if tk.is_next("MINHEIGHT") {
                settings.min_height = tk.next_fraction("MINHEIGHT")?;
            } else if tk.is_next("MAXHEIGHT") {
                settings.max_height = tk.next_fraction("MAXHEIGHT")?;
            } else if tk.is_next("MINRATIOWH") {
                settings.min_ratio_wh = tk.next_fraction("MINRATIOWH")?;
            } else if tk.is_next("MAXRATIOWH") {
                settings.max_ratio_wh = tk.next_fraction("MAXRATIOWH")?;
            } else if tk.is_next("SEED") {
                settings.seed = Some(tk.next_int("SEED")?);
            } else if tk.is_next("WORKERS") {
                settings.num_workers = tk.next_int("WORKERS")?;
            } else if tk.is_next("LOOSESCALE") {
                settings.strict_scale = false;
            } else {
                break;
            }
        }
        tk.finish()?;
        settings.min_matches = settings.effective_min_matches();
        settings.validate()?;
        Ok(settings)
    }
}

impl fmt::Display for RansacSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.model_type.code(),
            self.num_cycles,
            self.dist_max_inliers
        )?;
        if self.min_matches > self.model_type.min_samples() {
            write!(f, "_MINMATCHES_{}", self.min_matches)?;
        }
        if self.correction {
            f.write_str("_CORRECTION")?;
        }
        let bounds = [
            ("MINWIDTH", self.min_width),
            ("MAXWIDTH", self.max_width),
            ("MINHEIGHT", self.min_height),
            ("MAXHEIGHT", self.max_height),
            ("MINRATIOWH", self.min_ratio_wh),
            ("MAXRATIOWH", self.max_ratio_wh),
        ];
        for (name, value) in bounds {
            if value > 0.0 {
                write!(f, "_{name}_{value}")?;
            }
        }
        if let Some(seed) = self.seed {
            write!(f, "_SEED_{seed}")?;
        }
        if self.num_workers != 1 {
            write!(f, "_WORKERS_{}", self.num_workers)?;
        }
        if !self.strict_scale {
            f.write_str("_LOOSESCALE")?;
        }
        Ok(())
    }
}

/// Pair matcher composition.
#[derive(Debug, Clone, PartialEq)]
pub enum PairMatcherSettings {
    Match(BasicMatcherSettings),
    Ransac(BasicMatcherSettings, RansacSettings),
}

impl PairMatcherSettings {
    pub fn basic(&self) -> &BasicMatcherSettings {
        match self {
            PairMatcherSettings::Match(basic) | PairMatcherSettings::Ransac(basic, _) => basic,
        }
    }

    pub fn ransac(&self) -> Option<&RansacSettings> {
        match self {
            PairMatcherSettings::Match(_) => None,
            PairMatcherSettings::Ransac(_, ransac) => Some(ransac),
        }
    }
}

impl FromStr for PairMatcherSettings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConfigError::Empty {
                expected: PAIR_FORMAT,
            });
        }
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [kind, basic] if kind.eq_ignore_ascii_case("MATCH") => {
                Ok(PairMatcherSettings::Match(basic.parse()?))
            }
            [kind, basic, ransac] if kind.eq_ignore_ascii_case("RANSAC") => Ok(
                PairMatcherSettings::Ransac(basic.parse()?, ransac.parse()?),
            ),
            _ => Err(ConfigError::UnknownMatcher(s.to_string())),
        }
    }
}

impl fmt::Display for PairMatcherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairMatcherSettings::Match(basic) => write!(f, "MATCH,{basic}"),
            PairMatcherSettings::Ransac(basic, ransac) => write!(f, "RANSAC,{basic},{ransac}"),
        }
    }
}
