//! Populations of demographic groups per spatial unit.
use crate::access::SpatialUnitID;
use crate::id::define_id_type;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};

define_id_type! {GroupID}

/// Group populations for one region.
///
/// Each spatial unit has one population value per group, in the order of [`Demographics::groups`].
#[derive(Debug, Clone, PartialEq)]
pub struct Demographics {
    groups: IndexSet<GroupID>,
    populations: IndexMap<SpatialUnitID, Vec<f64>>,
}

impl Demographics {
    /// Create a new [`Demographics`], checking every unit has a value for every group
    pub fn new(
        groups: IndexSet<GroupID>,
        populations: IndexMap<SpatialUnitID, Vec<f64>>,
    ) -> Result<Self> {
        ensure!(!groups.is_empty(), "No demographic groups provided");
        for (unit, values) in &populations {
            ensure!(
                values.len() == groups.len(),
                "Spatial unit {unit} has {} group populations, expected {}",
                values.len(),
                groups.len()
            );
        }

        Ok(Self {
            groups,
            populations,
        })
    }

    /// The demographic groups, in column order
    pub fn groups(&self) -> &IndexSet<GroupID> {
        &self.groups
    }

    /// The group populations for a spatial unit
    pub fn get(&self, unit: &SpatialUnitID) -> Option<&[f64]> {
        self.populations.get(unit).map(Vec::as_slice)
    }
}
