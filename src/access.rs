//! Accessibility scores: the number of opportunities reachable from each spatial unit.
use crate::error::DataQualityError;
use crate::id::define_id_type;
use anyhow::{Result, bail};
use indexmap::IndexMap;
use itertools::{Itertools, MinMaxResult};

define_id_type! {SpatialUnitID}

/// Opportunities reachable from one spatial unit within the same travel-time budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessRecord {
    /// Opportunities reachable by transit
    pub transit: f64,
    /// Opportunities reachable by car
    pub auto: f64,
}

/// Accessibility records for one region and time of day, in file order
pub type AccessTable = IndexMap<SpatialUnitID, AccessRecord>;

/// Which accessibility measure is analysed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// The absolute number of opportunities reachable by transit
    Absolute,
    /// Transit access as a fraction of auto access
    Ratio,
}

impl ScoreKind {
    /// The score of a single record.
    ///
    /// Ratios are undefined where auto access is zero, in which case `None` is returned.
    pub fn score(self, record: &AccessRecord) -> Option<f64> {
        match self {
            Self::Absolute => Some(record.transit),
            Self::Ratio => (record.auto > 0.0).then(|| record.transit / record.auto),
        }
    }
}

/// The score column analysed for one region and time of day
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Access {
    scores: IndexMap<SpatialUnitID, f64>,
}

impl Access {
    /// Create a new [`Access`] from precomputed scores
    pub fn new(scores: IndexMap<SpatialUnitID, f64>) -> Self {
        Self { scores }
    }

    /// Derive the score column of the given kind from raw accessibility records.
    ///
    /// Records with zero auto access are a data quality error for ratio scores.
    pub fn from_table(table: &AccessTable, kind: ScoreKind) -> Result<Self> {
        let mut scores = IndexMap::with_capacity(table.len());
        let mut undefined = Vec::new();
        for (unit, record) in table {
            match kind.score(record) {
                Some(score) => {
                    scores.insert(unit.clone(), score);
                }
                None => undefined.push(unit),
            }
        }

        if let Some(first) = undefined.first() {
            bail!(DataQualityError::ZeroAutoAccess {
                count: undefined.len(),
                first: first.to_string(),
            });
        }

        Ok(Self { scores })
    }

    /// Iterate over spatial units and their scores
    pub fn iter(&self) -> impl Iterator<Item = (&SpatialUnitID, f64)> {
        self.scores.iter().map(|(unit, score)| (unit, *score))
    }

    /// The score for a spatial unit, if present
    pub fn get(&self, unit: &SpatialUnitID) -> Option<f64> {
        self.scores.get(unit).copied()
    }

    /// The number of scored spatial units
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether there are no scores
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The minimum and maximum scores, or `None` if the column is empty
    pub fn min_max(&self) -> Option<(f64, f64)> {
        match self.scores.values().copied().minmax_by(f64::total_cmp) {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(x) => Some((x, x)),
            MinMaxResult::MinMax(min, max) => Some((min, max)),
        }
    }

    /// The scores sorted in ascending order
    pub fn sorted_scores(&self) -> Vec<f64> {
        self.scores
            .values()
            .copied()
            .sorted_by(f64::total_cmp)
            .collect()
    }
}
