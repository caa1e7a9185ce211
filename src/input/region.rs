//! Code for reading region-related information from CSV files.
use super::*;
use crate::region::{Region, RegionMap};
use std::path::Path;

const REGIONS_FILE_NAME: &str = "regions.csv";

/// Reads regions from a CSV file.
///
/// # Arguments
///
/// * `project_dir` - Folder containing project configuration files
///
/// # Returns
///
/// A [`RegionMap`] in file order, or an error
pub fn read_regions(project_dir: &Path) -> Result<RegionMap> {
    let file_path = project_dir.join(REGIONS_FILE_NAME);
    let regions: Vec<Region> = read_csv(&file_path)?;

    let mut map = RegionMap::with_capacity(regions.len());
    for region in regions {
        let id = region.id.clone();
        ensure!(
            map.insert(id.clone(), region).is_none(),
            "Duplicate region ID {id} in {}",
            file_path.display()
        );
    }

    Ok(map)
}
