//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use csv::StringRecord;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod access;
pub mod demographic;
pub mod region;
pub mod supply;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_optional(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file which may have no rows after its header.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;

    let mut vec = Vec::new();
    for result in reader.deserialize() {
        let record: T = result.with_context(|| input_err_msg(file_path))?;
        vec.push(record);
    }

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether a slice is strictly increasing
pub fn is_sorted_and_unique<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

/// A CSV file whose columns are chosen at run time (e.g. `C000_c45`).
///
/// Every value is kept as text so that spatial unit IDs keep their leading zeros.
pub struct CsvTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl CsvTable {
    /// Read a whole CSV file into memory
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let mut reader =
            csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;
        let headers = reader
            .headers()
            .with_context(|| input_err_msg(file_path))?
            .clone();
        let records: Vec<_> = reader
            .records()
            .collect::<Result<_, _>>()
            .with_context(|| input_err_msg(file_path))?;
        ensure!(
            !records.is_empty(),
            "CSV file {} cannot be empty",
            file_path.display()
        );

        Ok(Self { headers, records })
    }

    /// The column names, in file order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    /// The position of the named column
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .with_context(|| format!("Missing column {name}"))
    }

    /// The number of data rows
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Iterate over the text values of one column
    pub fn iter_column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(move |record| record.get(index).unwrap_or_default())
    }

    /// Iterate over the values of one column parsed as floats
    pub fn iter_float_column(&self, index: usize) -> impl Iterator<Item = Result<f64>> {
        let name = &self.headers[index];
        self.iter_column(index).enumerate().map(move |(row, value)| {
            value
                .trim()
                .parse()
                .with_context(|| {
                    format!("Invalid number {value:?} in column {name}, row {}", row + 1)
                })
        })
    }
}

/// Expand a file name pattern into a path inside the project folder.
///
/// Supported placeholders are `{region}`, `{tod}`, `{week}` and `{layer}` (`{week}_{tod}`).
pub fn expand_pattern(
    project_dir: &Path,
    pattern: &str,
    region: &str,
    week_of: &str,
    tod: Option<&str>,
) -> Result<std::path::PathBuf> {
    let mut expanded = pattern
        .replace("{region}", region)
        .replace("{week}", week_of);
    if let Some(tod) = tod {
        expanded = expanded
            .replace("{layer}", &format!("{week_of}_{tod}"))
            .replace("{tod}", tod);
    }
    ensure!(
        !expanded.contains('{'),
        "Unresolved placeholder in file pattern {pattern}"
    );

    Ok(project_dir.join(expanded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    fn create_csv_file(dir_path: &Path, contents: &str) -> std::path::PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\n010010201001,1\n010010201002,2");
        let records: Vec<Record> = read_csv(&file_path).unwrap();
        assert_eq!(
            records,
            [
                Record {
                    id: "010010201001".into(),
                    value: 1
                },
                Record {
                    id: "010010201002".into(),
                    value: 2
                }
            ]
        );

        // Header only
        let file_path = create_csv_file(dir.path(), "id,value");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(read_csv_optional::<Record>(&file_path).unwrap().is_empty());
    }

    #[test]
    fn test_csv_table() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "BG20,C000\n0101,3.5\n0102,x");
        let table = CsvTable::from_path(&file_path).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_index("C000").unwrap(), 1);
        assert!(table.column_index("C001").is_err());
        assert_eq!(table.iter_column(0).collect::<Vec<_>>(), ["0101", "0102"]);

        let values: Vec<_> = table.iter_float_column(1).collect();
        assert_eq!(*values[0].as_ref().unwrap(), 3.5);
        assert!(values[1].is_err());
    }

    #[test]
    fn test_is_sorted_and_unique() {
        assert!(is_sorted_and_unique::<u8>(&[]));
        assert!(is_sorted_and_unique(&[1, 6, 11]));
        assert!(!is_sorted_and_unique(&[1, 1]));
        assert!(!is_sorted_and_unique(&[6, 1]));
    }

    #[test]
    fn test_expand_pattern() {
        let dir = Path::new("project");
        assert_eq!(
            expand_pattern(
                dir,
                "{region}/acs_{region}_{week}_{tod}.csv",
                "WAS",
                "20240304",
                Some("WEDAM")
            )
            .unwrap(),
            dir.join("WAS/acs_WAS_20240304_WEDAM.csv")
        );
        assert_eq!(
            expand_pattern(dir, "{layer}.geojson", "WAS", "20240304", Some("SATAM")).unwrap(),
            dir.join("20240304_SATAM.geojson")
        );
        assert!(expand_pattern(dir, "{region}_{tod}.csv", "WAS", "20240304", None).is_err());
    }
}
