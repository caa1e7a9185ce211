//! In-memory accumulation of sweep results, flushed to disk once the sweep is complete.
use crate::demographic::GroupID;
use crate::poverty_line::{Percent, PovertyLine};
use crate::region::RegionID;
use crate::time_of_day::TimeOfDayID;
use serde::{Deserialize, Serialize};

/// Poverty indices for one demographic group at one point of the sweep grid.
///
/// Field order defines the column order of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    /// The demographic group
    pub group: GroupID,
    /// Headcount ratio
    pub fgt0: f64,
    /// Poverty gap
    pub fgt1: f64,
    /// Squared poverty gap
    pub fgt2: f64,
    /// The region
    pub region: RegionID,
    /// The time of day
    pub tod: TimeOfDayID,
    /// The poverty-line parameter
    pub p: Percent,
}

/// The poverty line used at one point of the sweep grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLookupRow {
    /// The region
    pub region: RegionID,
    /// The time of day
    pub tod: TimeOfDayID,
    /// The poverty-line parameter
    pub p: Percent,
    /// The poverty line derived from `p`
    pub value: f64,
}

/// Rows produced by a sweep, in the order they were computed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepAccumulator {
    results: Vec<SweepRow>,
    lines: Vec<ThresholdLookupRow>,
}

impl SweepAccumulator {
    /// Record the poverty line used for a grid point
    pub fn push_line(
        &mut self,
        region: &RegionID,
        tod: &TimeOfDayID,
        p: Percent,
        line: PovertyLine,
    ) {
        self.lines.push(ThresholdLookupRow {
            region: region.clone(),
            tod: tod.clone(),
            p,
            value: line.0,
        });
    }

    /// Record the poverty indices of one group at a grid point
    pub fn push_result(&mut self, row: SweepRow) {
        self.results.push(row);
    }

    /// Append the contents of another accumulator to this one
    pub fn merge(&mut self, other: SweepAccumulator) {
        self.results.extend(other.results);
        self.lines.extend(other.lines);
    }

    /// The rows of the results table
    pub fn results(&self) -> &[SweepRow] {
        &self.results
    }

    /// The rows of the threshold lookup table
    pub fn lines(&self) -> &[ThresholdLookupRow] {
        &self.lines
    }
}
