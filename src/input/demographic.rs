//! Code for reading demographic tables.
use super::supply::check_count;
use super::*;
use crate::access::SpatialUnitID;
use crate::demographic::{Demographics, GroupID};
use indexmap::{IndexMap, IndexSet};
use std::path::Path;

/// Read the demographic table for one region.
///
/// Every column other than `id_column` is the population of one demographic group.
pub fn read_demographics(file_path: &Path, id_column: &str) -> Result<Demographics> {
    let table = CsvTable::from_path(file_path)?;
    read_demographics_from_table(&table, id_column).with_context(|| input_err_msg(file_path))
}

fn read_demographics_from_table(table: &CsvTable, id_column: &str) -> Result<Demographics> {
    let id_idx = table.column_index(id_column)?;
    let group_columns: Vec<(usize, &str)> = table
        .headers()
        .enumerate()
        .filter(|(idx, _)| *idx != id_idx)
        .collect();

    let mut groups = IndexSet::with_capacity(group_columns.len());
    for (_, name) in &group_columns {
        ensure!(
            groups.insert(GroupID::new(name)),
            "Duplicate group column {name}"
        );
    }

    let ids: Vec<SpatialUnitID> = table.iter_column(id_idx).map(SpatialUnitID::new).collect();
    let mut values = vec![Vec::with_capacity(group_columns.len()); ids.len()];
    for (idx, name) in &group_columns {
        for ((unit, value), row) in ids
            .iter()
            .zip(table.iter_float_column(*idx))
            .zip(values.iter_mut())
        {
            row.push(check_count(name, unit, value?)?);
        }
    }

    let mut populations = IndexMap::with_capacity(ids.len());
    for (unit, row) in ids.into_iter().zip(values) {
        ensure!(
            !populations.contains_key(&unit),
            "Duplicate spatial unit {unit}"
        );
        populations.insert(unit, row);
    }

    Demographics::new(groups, populations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_demographics() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("demographics.csv");
        fs::write(
            &file_path,
            "total,BG20,low_income\n100,0101,20\n50,0102,0\n",
        )
        .unwrap();

        let demographics = read_demographics(&file_path, "BG20").unwrap();
        assert_eq!(
            demographics
                .groups()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["total", "low_income"]
        );
        assert_eq!(
            demographics.get(&"0101".into()),
            Some([100.0, 20.0].as_slice())
        );
        assert_eq!(demographics.get(&"0102".into()), Some([50.0, 0.0].as_slice()));
    }

    #[test]
    fn test_read_demographics_no_groups() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("demographics.csv");
        fs::write(&file_path, "BG20\n0101\n").unwrap();
        assert!(read_demographics(&file_path, "BG20").is_err());
    }
}
