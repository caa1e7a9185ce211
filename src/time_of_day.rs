//! Times of day label which accessibility snapshot is analysed (e.g. weekday AM peak).
use crate::id::define_id_type;

define_id_type! {TimeOfDayID}

/// The name of a geospatial layer for the given week and time of day, e.g. `20240304_WEDAM`
pub fn layer_name(week_of: &str, tod: &TimeOfDayID) -> String {
    format!("{week_of}_{tod}")
}
