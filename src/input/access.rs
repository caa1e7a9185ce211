//! Code for reading accessibility score tables.
use super::supply::check_count;
use super::*;
use crate::access::{AccessRecord, AccessTable, SpatialUnitID};
use std::path::Path;

/// The columns of an accessibility score table
#[derive(Debug, Clone, Copy)]
pub struct AccessColumns<'a> {
    /// Spatial unit IDs
    pub id: &'a str,
    /// Opportunities reachable by transit
    pub transit: &'a str,
    /// Opportunities reachable by car
    pub auto: &'a str,
}

/// Read the accessibility scores for one region and time of day
pub fn read_access(file_path: &Path, columns: AccessColumns) -> Result<AccessTable> {
    let table = CsvTable::from_path(file_path)?;
    read_access_from_table(&table, columns).with_context(|| input_err_msg(file_path))
}

fn read_access_from_table(table: &CsvTable, columns: AccessColumns) -> Result<AccessTable> {
    let id_idx = table.column_index(columns.id)?;
    let transit_idx = table.column_index(columns.transit)?;
    let auto_idx = table.column_index(columns.auto)?;

    let mut records = AccessTable::with_capacity(table.row_count());
    for ((id, transit), auto) in table
        .iter_column(id_idx)
        .zip(table.iter_float_column(transit_idx))
        .zip(table.iter_float_column(auto_idx))
    {
        let unit = SpatialUnitID::new(id);
        let record = AccessRecord {
            transit: check_count(columns.transit, &unit, transit?)?,
            auto: check_count(columns.auto, &unit, auto?)?,
        };
        ensure!(
            records.insert(unit.clone(), record).is_none(),
            "Duplicate spatial unit {unit}"
        );
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const COLUMNS: AccessColumns = AccessColumns {
        id: "BG20",
        transit: "C000_c45",
        auto: "C000_c45_auto",
    };

    #[test]
    fn test_read_access() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("scores.csv");
        fs::write(
            &file_path,
            "BG20,C000_c45,C000_c45_auto\n0101,450,900\n0102,0,0\n",
        )
        .unwrap();

        let table = read_access(&file_path, COLUMNS).unwrap();
        assert_eq!(
            table.get(&SpatialUnitID::new("0101")),
            Some(&AccessRecord {
                transit: 450.0,
                auto: 900.0
            })
        );

        // Zero auto access is only a problem once ratios are derived
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_read_access_missing_column() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("scores.csv");
        fs::write(&file_path, "BG20,C000_c45\n0101,450\n").unwrap();
        assert!(read_access(&file_path, COLUMNS).is_err());
    }
}
