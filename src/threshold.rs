//! Looks up previously swept poverty lines to use as classification breaks on a map.
use crate::error::LookupMissError;
use crate::input::{input_err_msg, read_csv_optional};
use crate::poverty_line::Percent;
use crate::region::RegionID;
use crate::sweep::ThresholdLookupRow;
use crate::time_of_day::TimeOfDayID;
use anyhow::{Context, Result, bail, ensure};
use std::collections::HashMap;
use std::path::Path;

/// A threshold lookup table written by the sweep, indexed by region, time of day and parameter
#[derive(Debug, Default)]
pub struct ThresholdTable {
    values: HashMap<(RegionID, TimeOfDayID, Percent), f64>,
}

impl ThresholdTable {
    /// Read a threshold lookup table from file.
    ///
    /// A table with no rows is valid: every lookup in it misses.
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let rows: Vec<ThresholdLookupRow> = read_csv_optional(file_path)?;
        Self::from_rows(rows).with_context(|| input_err_msg(file_path))
    }

    /// Index rows of a threshold lookup table.
    ///
    /// Each (region, time of day, parameter) triple may only appear once.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = ThresholdLookupRow>,
    {
        let mut values = HashMap::new();
        for row in rows {
            let key = (row.region, row.tod, row.p);
            ensure!(
                values.insert(key.clone(), row.value).is_none(),
                "Duplicate poverty line for region {}, time of day {}, p = {}",
                key.0,
                key.1,
                key.2
            );
        }

        Ok(Self { values })
    }

    /// Resolve a classification domain: the poverty lines at each marker, in marker order.
    ///
    /// The domain keeps the caller's ordering even if the values are not increasing. A missing
    /// marker is an error.
    pub fn resolve(
        &self,
        region: &RegionID,
        tod: &TimeOfDayID,
        markers: &[Percent],
    ) -> Result<Vec<f64>> {
        markers
            .iter()
            .map(|&p| match self.values.get(&(region.clone(), tod.clone(), p)) {
                Some(value) => Ok(*value),
                None => bail!(LookupMissError {
                    region: region.to_string(),
                    tod: tod.to_string(),
                    p: p.get(),
                }),
            })
            .collect()
    }
}
