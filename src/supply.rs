//! Job supply (the opportunities reachable by travellers) per spatial unit.
use crate::access::SpatialUnitID;
use indexmap::IndexMap;

/// Supply counts for one region, keyed by spatial unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Supply {
    counts: IndexMap<SpatialUnitID, f64>,
}

impl Supply {
    /// Create a new [`Supply`] from non-negative counts
    pub fn new(counts: IndexMap<SpatialUnitID, f64>) -> Self {
        Self { counts }
    }

    /// The total supply over all units in the region
    pub fn total(&self) -> f64 {
        self.counts.values().sum()
    }
}
