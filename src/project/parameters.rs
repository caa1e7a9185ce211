//! Defines the `ProjectParameters` struct, which represents the contents of `project.toml`.
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use crate::poverty_line::{LineMode, Percent};
use crate::region::RegionID;
use crate::time_of_day::TimeOfDayID;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use strum::IntoEnumIterator;

const PROJECT_PARAMETERS_FILE_NAME: &str = "project.toml";

/// The smallest number of classification breaks on a map (five colour classes)
const MIN_MARKERS: usize = 4;

/// The largest number of classification breaks on a map (eight colour classes)
const MAX_MARKERS: usize = 7;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_id_column, String, "BG20".into());
define_param_default!(default_supply_column, String, "C000".into());
define_param_default!(default_transit_column, String, "C000_c45".into());
define_param_default!(default_auto_column, String, "C000_c45_auto".into());
define_param_default!(default_supply_file, String, "{region}/supply/supply.csv".into());
define_param_default!(
    default_demographics_file,
    String,
    "{region}/demographics.csv".into()
);
define_param_default!(
    default_scores_file,
    String,
    "{region}/scores/acs_{region}_{week}_{tod}.csv".into()
);
define_param_default!(
    default_polygons_file,
    String,
    "{region}/gpkg/acs_{region}_{layer}.geojson".into()
);
define_param_default!(
    default_transit_file,
    String,
    "transit/{region}_transit_1.geojson".into()
);
define_param_default!(default_strategies, Vec<LineMode>, LineMode::iter().collect());
define_param_default!(default_first_percent, u8, 1);
define_param_default!(default_last_percent, u8, 100);
define_param_default!(default_map_size, u32, 2000);
define_param_default!(default_fraction_markers, Vec<u8>, vec![1, 6, 11, 16, 21, 26, 31]);
define_param_default!(default_auto_markers, Vec<u8>, vec![1, 6, 11, 16, 21, 26, 31]);
define_param_default!(default_percentile_markers, Vec<u8>, vec![20, 40, 60, 80]);

/// Represents the contents of the entire project file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ProjectParameters {
    /// The week the accessibility snapshots were computed for (e.g. "20240304")
    pub week_of: String,
    /// The times of day to sweep, in order
    pub time_of_day: Vec<TimeOfDayID>,
    /// Names of columns in the input tables
    #[serde(default)]
    pub columns: Columns,
    /// Where input files are found, relative to the project folder
    #[serde(default)]
    pub files: FilePatterns,
    /// Sweep options
    #[serde(default)]
    pub sweep: SweepParameters,
    /// Map options
    #[serde(default)]
    pub maps: MapParameters,
}

/// Names of columns in the input tables
#[derive(Debug, Deserialize, PartialEq)]
pub struct Columns {
    /// Spatial unit identifiers, shared by every table
    #[serde(default = "default_id_column")]
    pub id: String,
    /// Job supply in the supply table
    #[serde(default = "default_supply_column")]
    pub supply: String,
    /// Jobs reachable by transit in the score tables
    #[serde(default = "default_transit_column")]
    pub transit_access: String,
    /// Jobs reachable by car in the score tables
    #[serde(default = "default_auto_column")]
    pub auto_access: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            id: default_id_column(),
            supply: default_supply_column(),
            transit_access: default_transit_column(),
            auto_access: default_auto_column(),
        }
    }
}

/// Input file name patterns.
///
/// `{region}`, `{tod}`, `{week}` and `{layer}` (`{week}_{tod}`) are replaced when files are read.
#[derive(Debug, Deserialize, PartialEq)]
pub struct FilePatterns {
    /// Supply table for a region
    #[serde(default = "default_supply_file")]
    pub supply: String,
    /// Demographic table for a region
    #[serde(default = "default_demographics_file")]
    pub demographics: String,
    /// Accessibility scores for a region and time of day
    #[serde(default = "default_scores_file")]
    pub scores: String,
    /// GeoJSON polygon layer for a region and time of day
    #[serde(default = "default_polygons_file")]
    pub polygons: String,
    /// GeoJSON layer of major transit lines for a region
    #[serde(default = "default_transit_file")]
    pub transit_lines: String,
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            supply: default_supply_file(),
            demographics: default_demographics_file(),
            scores: default_scores_file(),
            polygons: default_polygons_file(),
            transit_lines: default_transit_file(),
        }
    }
}

/// Options for the sensitivity sweep
#[derive(Debug, Deserialize, PartialEq)]
pub struct SweepParameters {
    /// Poverty-line strategies to sweep, each written to its own tables
    #[serde(default = "default_strategies")]
    pub strategies: Vec<LineMode>,
    /// The first poverty-line parameter
    #[serde(default = "default_first_percent")]
    pub first_percent: u8,
    /// The last poverty-line parameter (inclusive)
    #[serde(default = "default_last_percent")]
    pub last_percent: u8,
}

impl Default for SweepParameters {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            first_percent: default_first_percent(),
            last_percent: default_last_percent(),
        }
    }
}

impl SweepParameters {
    /// The swept poverty-line parameters, in ascending order
    pub fn percents(&self) -> Result<Vec<Percent>> {
        let first = Percent::new(self.first_percent)?;
        let last = Percent::new(self.last_percent)?;
        Ok(Percent::range(first, last).collect())
    }
}

/// Options for map rendering
#[derive(Debug, Deserialize, PartialEq)]
pub struct MapParameters {
    /// The time of day to map (defaults to the first swept time of day)
    pub time_of_day: Option<TimeOfDayID>,
    /// The regions to map (defaults to all regions)
    pub regions: Option<Vec<RegionID>>,
    /// Human-readable description of the mapped snapshot (e.g. "March 3, 2024, 7-9am")
    pub layer_title: Option<String>,
    /// Image width in pixels
    #[serde(default = "default_map_size")]
    pub width: u32,
    /// Image height in pixels
    #[serde(default = "default_map_size")]
    pub height: u32,
    /// Classification breaks for maps of poverty lines as a fraction of supply
    #[serde(default = "default_fraction_markers")]
    pub fraction_markers: Vec<u8>,
    /// Classification breaks for maps of poverty lines as a ratio of auto access
    #[serde(default = "default_auto_markers")]
    pub auto_markers: Vec<u8>,
    /// Classification breaks for maps of percentile poverty lines
    #[serde(default = "default_percentile_markers")]
    pub percentile_markers: Vec<u8>,
}

impl Default for MapParameters {
    fn default() -> Self {
        Self {
            time_of_day: None,
            regions: None,
            layer_title: None,
            width: default_map_size(),
            height: default_map_size(),
            fraction_markers: default_fraction_markers(),
            auto_markers: default_auto_markers(),
            percentile_markers: default_percentile_markers(),
        }
    }
}

/// Check that the `time_of_day` parameter is valid
fn check_time_of_day(tods: &[TimeOfDayID]) -> Result<()> {
    ensure!(!tods.is_empty(), "`time_of_day` is empty");

    let unique: HashSet<_> = tods.iter().collect();
    ensure!(
        unique.len() == tods.len(),
        "`time_of_day` contains duplicate entries"
    );

    Ok(())
}

/// Check that the `strategies` parameter is valid
fn check_strategies(strategies: &[LineMode]) -> Result<()> {
    ensure!(!strategies.is_empty(), "`sweep.strategies` is empty");

    let unique: HashSet<_> = strategies.iter().collect();
    ensure!(
        unique.len() == strategies.len(),
        "`sweep.strategies` contains duplicate entries"
    );

    Ok(())
}

/// Check that the percentage range is valid
fn check_percent_range(first: u8, last: u8) -> Result<()> {
    Percent::new(first).context("Invalid value for `sweep.first_percent`")?;
    Percent::new(last).context("Invalid value for `sweep.last_percent`")?;
    ensure!(
        first <= last,
        "`sweep.first_percent` cannot be greater than `sweep.last_percent`"
    );

    Ok(())
}

/// Check that a list of map markers is valid
fn check_markers(name: &str, markers: &[u8]) -> Result<()> {
    ensure!(
        (MIN_MARKERS..=MAX_MARKERS).contains(&markers.len()),
        "`maps.{name}` must have between {MIN_MARKERS} and {MAX_MARKERS} entries"
    );
    for marker in markers {
        Percent::new(*marker).with_context(|| format!("Invalid value in `maps.{name}`"))?;
    }
    ensure!(
        is_sorted_and_unique(markers),
        "`maps.{name}` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that the map image size is valid
fn check_map_size(width: u32, height: u32) -> Result<()> {
    ensure!(
        width >= 100 && height >= 100,
        "Map images must be at least 100 pixels wide and high"
    );

    Ok(())
}

impl ProjectParameters {
    /// Read a project file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `project_dir` - Folder containing project configuration files
    pub fn from_path<P: AsRef<Path>>(project_dir: P) -> Result<ProjectParameters> {
        let file_path = project_dir.as_ref().join(PROJECT_PARAMETERS_FILE_NAME);
        let params: ProjectParameters = read_toml(&file_path)?;

        params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        ensure!(!self.week_of.is_empty(), "`week_of` is empty");
        check_time_of_day(&self.time_of_day)?;
        check_strategies(&self.sweep.strategies)?;
        check_percent_range(self.sweep.first_percent, self.sweep.last_percent)?;

        if let Some(tod) = &self.maps.time_of_day {
            ensure!(
                self.time_of_day.contains(tod),
                "`maps.time_of_day` ({tod}) is not one of the swept times of day"
            );
        }
        check_markers("fraction_markers", &self.maps.fraction_markers)?;
        check_markers("auto_markers", &self.maps.auto_markers)?;
        check_markers("percentile_markers", &self.maps.percentile_markers)?;
        check_map_size(self.maps.width, self.maps.height)?;

        Ok(())
    }

    /// The time of day to map
    pub fn map_time_of_day(&self) -> &TimeOfDayID {
        self.maps
            .time_of_day
            .as_ref()
            .unwrap_or(&self.time_of_day[0])
    }
}
