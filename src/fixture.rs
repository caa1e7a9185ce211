//! Fixtures for tests

use crate::access::{Access, AccessRecord, AccessTable, ScoreKind};
use crate::demographic::Demographics;
use crate::region::RegionID;
use crate::time_of_day::TimeOfDayID;
use indexmap::{indexmap, indexset};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn region_id() -> RegionID {
    "WAS".into()
}

#[fixture]
pub fn tod() -> TimeOfDayID {
    "WEDAM".into()
}

/// Three spatial units with transit/auto ratios of 0.25, 0.1 and 0.5
#[fixture]
pub fn access_table() -> AccessTable {
    indexmap! {
        "A".into() => AccessRecord { transit: 100.0, auto: 400.0 },
        "B".into() => AccessRecord { transit: 50.0, auto: 500.0 },
        "C".into() => AccessRecord { transit: 450.0, auto: 900.0 },
    }
}

/// Absolute transit scores for [`access_table`]
#[fixture]
pub fn access(access_table: AccessTable) -> Access {
    Access::from_table(&access_table, ScoreKind::Absolute).unwrap()
}

#[fixture]
pub fn demographics() -> Demographics {
    Demographics::new(
        indexset! {"total".into(), "low_income".into()},
        indexmap! {
            "A".into() => vec![10.0, 5.0],
            "B".into() => vec![30.0, 5.0],
            "C".into() => vec![60.0, 0.0],
        },
    )
    .unwrap()
}
