//! Strategies for turning a percentage parameter into a concrete poverty line.
//!
//! The same parameter `p` means different things under different strategies (a fraction of auto
//! access, a fraction of the region's jobs or a percentile of the score distribution), so the
//! resulting [`PovertyLine`]s must never be compared across strategies.
use crate::access::{Access, ScoreKind};
use crate::error::DataQualityError;
use crate::region::RegionID;
use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::fmt;

/// The smallest valid poverty-line parameter
pub const MIN_PERCENT: u8 = 1;

/// The largest valid poverty-line parameter
pub const MAX_PERCENT: u8 = 100;

/// A poverty-line parameter in the range [1, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percent(u8);

impl Percent {
    /// Create a new [`Percent`], checking that it is in range
    pub fn new(value: u8) -> Result<Self> {
        ensure!(
            (MIN_PERCENT..=MAX_PERCENT).contains(&value),
            "Poverty-line parameter must be between {MIN_PERCENT} and {MAX_PERCENT}, got {value}"
        );
        Ok(Self(value))
    }

    /// The parameter as an integer
    pub fn get(self) -> u8 {
        self.0
    }

    /// The parameter as a fraction in (0, 1]
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Iterate over every parameter from `first` to `last` inclusive, in ascending order
    pub fn range(first: Percent, last: Percent) -> impl Iterator<Item = Percent> {
        (first.0..=last.0).map(Percent)
    }
}

impl TryFrom<u8> for Percent {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Percent::new(value)
    }
}

impl From<Percent> for u8 {
    fn from(value: Percent) -> Self {
        value.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A concrete poverty line, in the units of the score column it applies to
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, derive_more::Display)]
pub struct PovertyLine(pub f64);

/// Information a strategy may need to derive a poverty line for one region and time of day
#[derive(Debug, Clone)]
pub struct LineContext<'a> {
    /// Total supply of the region, computed once before the region is swept
    pub total_supply: f64,
    /// The score column being analysed
    pub scores: &'a Access,
    /// The scores in ascending order
    sorted_scores: Vec<f64>,
}

impl<'a> LineContext<'a> {
    /// Create a new [`LineContext`]
    pub fn new(total_supply: f64, scores: &'a Access) -> Self {
        Self {
            total_supply,
            scores,
            sorted_scores: scores.sorted_scores(),
        }
    }

    /// The scores in ascending order
    pub fn sorted_scores(&self) -> &[f64] {
        &self.sorted_scores
    }
}

/// A way of converting a percentage parameter into a poverty line
pub trait PovertyLineStrategy {
    /// The poverty-line mode this strategy implements
    fn mode(&self) -> LineMode;

    /// Which score column the poverty line applies to
    fn score_kind(&self) -> ScoreKind;

    /// Check the region's total supply is one for which poverty lines are meaningful.
    ///
    /// Called once per region, before any of its times of day are swept.
    fn check_region(&self, _region: &RegionID, _total_supply: f64) -> Result<()> {
        Ok(())
    }

    /// Check the context is one for which poverty lines are meaningful.
    ///
    /// Called once per region and time of day, before any lines are derived.
    fn check_context(&self, _context: &LineContext) -> Result<()> {
        Ok(())
    }

    /// The poverty line for parameter `p`
    fn value(&self, p: Percent, context: &LineContext) -> PovertyLine;
}

/// The available poverty-line strategies
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
    strum::EnumIter,
)]
pub enum LineMode {
    /// A fraction of the region's total job supply
    #[string = "fraction_of_supply"]
    FractionOfSupply,
    /// A fraction of the opportunities reachable by car
    #[string = "auto_ratio"]
    AutoRatio,
    /// A percentile of the score distribution
    #[string = "percentile"]
    Percentile,
}

impl LineMode {
    /// The stem of the output file names for this mode (e.g. `fraction` for `fraction.csv`)
    pub fn output_stem(self) -> &'static str {
        match self {
            Self::FractionOfSupply => "fraction",
            Self::AutoRatio => "auto",
            Self::Percentile => "percentile",
        }
    }

    /// Get the strategy implementing this mode
    pub fn strategy(self) -> Box<dyn PovertyLineStrategy> {
        match self {
            Self::FractionOfSupply => Box::new(AbsoluteSupplyStrategy),
            Self::AutoRatio => Box::new(RatioStrategy),
            Self::Percentile => Box::new(PercentileStrategy),
        }
    }
}

/// Poverty line as a fraction of auto access: `p / 100`
pub struct RatioStrategy;

impl PovertyLineStrategy for RatioStrategy {
    fn mode(&self) -> LineMode {
        LineMode::AutoRatio
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Ratio
    }

    fn value(&self, p: Percent, _context: &LineContext) -> PovertyLine {
        PovertyLine(p.fraction())
    }
}

/// Poverty line as a fraction of the region's total job supply: `(p / 100) * total`
pub struct AbsoluteSupplyStrategy;

impl PovertyLineStrategy for AbsoluteSupplyStrategy {
    fn mode(&self) -> LineMode {
        LineMode::FractionOfSupply
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Absolute
    }

    fn check_region(&self, region: &RegionID, total_supply: f64) -> Result<()> {
        if total_supply <= 0.0 {
            bail!(DataQualityError::ZeroTotalSupply {
                region: region.to_string(),
            });
        }

        Ok(())
    }

    fn value(&self, p: Percent, context: &LineContext) -> PovertyLine {
        PovertyLine(p.fraction() * context.total_supply)
    }
}

/// Poverty line at the `p`th percentile of the absolute scores
pub struct PercentileStrategy;

impl PovertyLineStrategy for PercentileStrategy {
    fn mode(&self) -> LineMode {
        LineMode::Percentile
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Absolute
    }

    fn check_context(&self, context: &LineContext) -> Result<()> {
        if context.scores.is_empty() {
            bail!(DataQualityError::EmptyScores);
        }

        Ok(())
    }

    fn value(&self, p: Percent, context: &LineContext) -> PovertyLine {
        PovertyLine(percentile(context.sorted_scores(), p.fraction()))
    }
}

/// Linearly interpolated percentile of ascending `sorted` values, with `q` in [0, 1].
///
/// Returns zero for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };

    let rank = q * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
