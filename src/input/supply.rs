//! Code for reading job supply tables.
use super::*;
use crate::access::SpatialUnitID;
use crate::error::DataQualityError;
use crate::supply::Supply;
use indexmap::IndexMap;
use std::path::Path;

/// Check that a count read from an input table is finite and non-negative
pub(crate) fn check_count(column: &str, unit: &SpatialUnitID, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!(DataQualityError::InvalidCount {
            column: column.to_string(),
            unit: unit.to_string(),
            value,
        });
    }

    Ok(value)
}

/// Read the supply table for one region.
///
/// # Arguments
///
/// * `file_path` - The supply CSV file
/// * `id_column` - The column holding spatial unit IDs
/// * `supply_column` - The column holding supply counts
pub fn read_supply(file_path: &Path, id_column: &str, supply_column: &str) -> Result<Supply> {
    let table = CsvTable::from_path(file_path)?;
    read_supply_from_table(&table, id_column, supply_column)
        .with_context(|| input_err_msg(file_path))
}

fn read_supply_from_table(
    table: &CsvTable,
    id_column: &str,
    supply_column: &str,
) -> Result<Supply> {
    let id_idx = table.column_index(id_column)?;
    let supply_idx = table.column_index(supply_column)?;

    let mut counts = IndexMap::with_capacity(table.row_count());
    for (id, count) in table
        .iter_column(id_idx)
        .zip(table.iter_float_column(supply_idx))
    {
        let unit = SpatialUnitID::new(id);
        let count = check_count(supply_column, &unit, count?)?;
        ensure!(
            counts.insert(unit.clone(), count).is_none(),
            "Duplicate spatial unit {unit}"
        );
    }

    Ok(Supply::new(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use indexmap::indexmap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_supply() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("supply.csv");
        fs::write(&file_path, "BG20,C000,C001\n0101,600,1\n0102,400,2\n").unwrap();

        let supply = read_supply(&file_path, "BG20", "C000").unwrap();
        assert_eq!(
            supply,
            Supply::new(indexmap! {"0101".into() => 600.0, "0102".into() => 400.0})
        );
        assert_eq!(supply.total(), 1000.0);
    }

    #[test]
    fn test_read_supply_negative() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("supply.csv");
        fs::write(&file_path, "BG20,C000\n0101,-1\n").unwrap();

        let table = CsvTable::from_path(&file_path).unwrap();
        assert_error!(
            read_supply_from_table(&table, "BG20", "C000"),
            "invalid C000 value -1 for spatial unit 0101"
        );
    }

    #[test]
    fn test_read_supply_duplicate() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("supply.csv");
        fs::write(&file_path, "BG20,C000\n0101,1\n0101,2\n").unwrap();

        let table = CsvTable::from_path(&file_path).unwrap();
        assert_error!(
            read_supply_from_table(&table, "BG20", "C000"),
            "Duplicate spatial unit 0101"
        );
    }
}
