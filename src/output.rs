//! The module responsible for writing output data to disk.
use crate::sweep::{SweepAccumulator, SweepRow, ThresholdLookupRow};
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub mod metadata;

/// The name of the folder maps are written to, inside the output folder
const MAPS_DIRECTORY_NAME: &str = "maps";

/// Get the default output folder for the project in the specified directory: a folder named after
/// the project inside `results_dir`
pub fn get_output_dir(project_dir: &Path, results_dir: &Path) -> Result<PathBuf> {
    // Get the project name from the dir path. This ends up being convoluted because we need to
    // check for all possible errors.
    let project_dir = project_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to project")?;

    let project_name = project_dir
        .file_name()
        .context("Project cannot be in root folder")?
        .to_str()
        .context("Invalid chars in project dir name")?;

    Ok(results_dir.join(project_name))
}

/// The default folder for maps, given the folder containing the sweep results
pub fn get_maps_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(MAPS_DIRECTORY_NAME)
}

/// Create a new output directory, if it doesn't already exist.
///
/// An existing non-empty folder is only reused if `allow_overwrite` is set, in which case its
/// contents are deleted first.
///
/// # Returns
///
/// Whether an existing folder's contents were deleted.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            // Empty folder, so nothing to overwrite
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete it or pass \
             --overwrite."
        );
        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// The path to the results table for a poverty-line strategy
pub fn results_file_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}.csv"))
}

/// The path to the threshold lookup table for a poverty-line strategy
pub fn lines_file_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}_lines.csv"))
}

/// A row type with a fixed column order
trait TableRow: Serialize {
    /// Column names, in the order the fields are serialised
    const COLUMNS: &'static [&'static str];
}

impl TableRow for SweepRow {
    const COLUMNS: &'static [&'static str] =
        &["group", "fgt0", "fgt1", "fgt2", "region", "tod", "p"];
}

impl TableRow for ThresholdLookupRow {
    const COLUMNS: &'static [&'static str] = &["region", "tod", "p", "value"];
}

/// Writes the tables produced by a sweep.
///
/// Each table is written to a temporary file which replaces the destination once complete, so a
/// table is either absent or whole.
pub struct ResultWriter<'a> {
    output_path: &'a Path,
}

impl<'a> ResultWriter<'a> {
    /// Create a new [`ResultWriter`] for the specified output folder
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write the results and threshold lookup tables of one strategy.
    ///
    /// # Arguments
    ///
    /// * `stem` - The strategy's output stem (e.g. `auto` for `auto.csv` and `auto_lines.csv`)
    /// * `accumulator` - The rows to write
    pub fn write(&self, stem: &str, accumulator: &SweepAccumulator) -> Result<()> {
        write_table(
            &results_file_path(self.output_path, stem),
            accumulator.results(),
        )?;
        write_table(
            &lines_file_path(self.output_path, stem),
            accumulator.lines(),
        )
    }
}

/// Write a file via a temporary file in the same folder, so the destination is never partial
pub fn write_atomically<F>(file_path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = file_path
        .parent()
        .context("Output file has no parent folder")?;
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    write(temp.as_file_mut())?;
    temp.persist(file_path)
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    Ok(())
}

/// Write a CSV table with a header row, even if there are no rows
fn write_table<T: TableRow>(file_path: &Path, rows: &[T]) -> Result<()> {
    write_atomically(file_path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(T::COLUMNS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    })
}
