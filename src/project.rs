//! A project is the folder of configuration and input data the program operates on.
use crate::access::AccessTable;
use crate::demographic::Demographics;
use crate::input::access::{AccessColumns, read_access};
use crate::input::demographic::read_demographics;
use crate::input::expand_pattern;
use crate::input::region::read_regions;
use crate::input::supply::read_supply;
use crate::region::{Region, RegionID, RegionMap};
use crate::supply::Supply;
use crate::time_of_day::TimeOfDayID;
use anyhow::{Context, Result, ensure};
use std::path::{Path, PathBuf};

pub mod parameters;
use parameters::ProjectParameters;

/// A project's configuration together with where its input files live
#[derive(Debug)]
pub struct Project {
    /// The project folder
    pub dir: PathBuf,
    /// Contents of `project.toml`
    pub parameters: ProjectParameters,
    /// Regions, in the order they are processed
    pub regions: RegionMap,
}

impl Project {
    /// Read a project from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `project_dir` - Folder containing project configuration files
    pub fn from_path<P: AsRef<Path>>(project_dir: P) -> Result<Project> {
        let dir = project_dir.as_ref().to_path_buf();
        let parameters = ProjectParameters::from_path(&dir)?;
        let regions = read_regions(&dir)?;

        if let Some(map_regions) = &parameters.maps.regions {
            for region in map_regions {
                ensure!(
                    regions.contains_key(region),
                    "`maps.regions` contains unknown region {region}"
                );
            }
        }

        Ok(Project {
            dir,
            parameters,
            regions,
        })
    }

    /// The regions to render maps for, in order
    pub fn map_regions(&self) -> Vec<&Region> {
        match &self.parameters.maps.regions {
            Some(ids) => ids.iter().filter_map(|id| self.regions.get(id)).collect(),
            None => self.regions.values().collect(),
        }
    }

    fn path_for(
        &self,
        pattern: &str,
        region: &RegionID,
        tod: Option<&TimeOfDayID>,
    ) -> Result<PathBuf> {
        expand_pattern(
            &self.dir,
            pattern,
            &region.0,
            &self.parameters.week_of,
            tod.map(|tod| &*tod.0),
        )
    }

    /// Path to the supply table for a region
    pub fn supply_path(&self, region: &RegionID) -> Result<PathBuf> {
        self.path_for(&self.parameters.files.supply, region, None)
    }

    /// Path to the demographic table for a region
    pub fn demographics_path(&self, region: &RegionID) -> Result<PathBuf> {
        self.path_for(&self.parameters.files.demographics, region, None)
    }

    /// Path to the accessibility scores for a region and time of day
    pub fn scores_path(&self, region: &RegionID, tod: &TimeOfDayID) -> Result<PathBuf> {
        self.path_for(&self.parameters.files.scores, region, Some(tod))
    }

    /// Path to the polygon layer for a region and time of day
    pub fn polygons_path(&self, region: &RegionID, tod: &TimeOfDayID) -> Result<PathBuf> {
        self.path_for(&self.parameters.files.polygons, region, Some(tod))
    }

    /// Path to the transit line layer for a region
    pub fn transit_lines_path(&self, region: &RegionID) -> Result<PathBuf> {
        self.path_for(&self.parameters.files.transit_lines, region, None)
    }

    /// The columns of the accessibility score tables
    pub fn access_columns(&self) -> AccessColumns<'_> {
        let columns = &self.parameters.columns;
        AccessColumns {
            id: &columns.id,
            transit: &columns.transit_access,
            auto: &columns.auto_access,
        }
    }

    /// Check that every input file needed by the sweep and the maps exists.
    ///
    /// Returns the paths of missing files.
    pub fn find_missing_inputs(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let map_tod = self.parameters.map_time_of_day();
        for region in self.regions.keys() {
            paths.push(self.supply_path(region)?);
            paths.push(self.demographics_path(region)?);
            for tod in &self.parameters.time_of_day {
                paths.push(self.scores_path(region, tod)?);
            }
        }
        for region in self.map_regions() {
            paths.push(self.polygons_path(&region.id, map_tod)?);
            paths.push(self.transit_lines_path(&region.id)?);
        }

        Ok(paths.into_iter().filter(|path| !path.is_file()).collect())
    }
}

/// Access to the input tables of a sweep.
///
/// The sweep only reads through this trait, so it can be run against in-memory data.
pub trait SweepSource {
    /// The regions to sweep, in order
    fn regions(&self) -> Vec<RegionID>;

    /// The times of day to sweep, in order
    fn times_of_day(&self) -> Vec<TimeOfDayID>;

    /// Load the supply table for a region
    fn load_supply(&self, region: &RegionID) -> Result<Supply>;

    /// Load the demographic table for a region
    fn load_demographics(&self, region: &RegionID) -> Result<Demographics>;

    /// Load the accessibility scores for a region and time of day
    fn load_access(&self, region: &RegionID, tod: &TimeOfDayID) -> Result<AccessTable>;
}

impl SweepSource for Project {
    fn regions(&self) -> Vec<RegionID> {
        self.regions.keys().cloned().collect()
    }

    fn times_of_day(&self) -> Vec<TimeOfDayID> {
        self.parameters.time_of_day.clone()
    }

    fn load_supply(&self, region: &RegionID) -> Result<Supply> {
        let columns = &self.parameters.columns;
        read_supply(&self.supply_path(region)?, &columns.id, &columns.supply)
            .with_context(|| format!("Failed to load supply for region {region}"))
    }

    fn load_demographics(&self, region: &RegionID) -> Result<Demographics> {
        read_demographics(&self.demographics_path(region)?, &self.parameters.columns.id)
            .with_context(|| format!("Failed to load demographics for region {region}"))
    }

    fn load_access(&self, region: &RegionID, tod: &TimeOfDayID) -> Result<AccessTable> {
        read_access(&self.scores_path(region, tod)?, self.access_columns())
            .with_context(|| format!("Failed to load scores for region {region}, {tod}"))
    }
}
