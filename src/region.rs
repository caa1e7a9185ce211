//! Regions are the metropolitan areas over which the sweep is run.
use crate::id::define_id_type;
use indexmap::IndexMap;
use serde::Deserialize;

define_id_type! {RegionID}

/// A map of [`Region`]s, keyed by region ID, in the order they were read
pub type RegionMap = IndexMap<RegionID, Region>;

/// Represents a region with an ID and a longer description.
#[derive(Debug, Deserialize, PartialEq)]
pub struct Region {
    /// A unique identifier for a region (e.g. "WAS").
    pub id: RegionID,
    /// A text description of the region (e.g. "Washington, DC").
    pub description: String,
}
