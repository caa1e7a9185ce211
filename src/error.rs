//! Failures which stop one unit of work (a region, a time of day or a map) but not the whole run.
use anyhow::{Result, ensure};
use log::{error, warn};
use thiserror::Error;

/// Input data which cannot be analysed without producing misleading results.
#[derive(Debug, Error, PartialEq)]
pub enum DataQualityError {
    /// The region has no job supply, so fractions of it are all zero
    #[error("total supply for region {region} is zero")]
    ZeroTotalSupply {
        /// The affected region
        region: String,
    },

    /// Transit/auto ratios are undefined where auto access is zero
    #[error("auto access is zero for {count} spatial unit(s) (first: {first}), ratio undefined")]
    ZeroAutoAccess {
        /// How many units are affected
        count: usize,
        /// The first affected spatial unit
        first: String,
    },

    /// A count which must be non-negative (or finite) is not
    #[error("invalid {column} value {value} for spatial unit {unit}")]
    InvalidCount {
        /// The column containing the value
        column: String,
        /// The spatial unit
        unit: String,
        /// The offending value
        value: f64,
    },

    /// The equity computation returned different groups for different FGT orders
    #[error("group {group} is missing from the FGT{alpha} results")]
    GroupMismatch {
        /// The group which could not be joined
        group: String,
        /// The FGT order without this group
        alpha: i32,
    },

    /// No scores are available to analyse
    #[error("the score column is empty")]
    EmptyScores,

    /// None of the scored spatial units have demographic data
    #[error("no scored spatial units have demographic data")]
    NoDemographicOverlap,
}

/// A classification break could not be found in a threshold lookup table.
#[derive(Debug, Error, PartialEq)]
#[error("no poverty line recorded for region {region}, time of day {tod}, p = {p}")]
pub struct LookupMissError {
    /// The region queried
    pub region: String,
    /// The time of day queried
    pub tod: String,
    /// The missing marker
    pub p: u8,
}

/// A polygon layer and an accessibility table have no spatial units in common.
#[derive(Debug, Error, PartialEq)]
#[error(
    "polygon layer ({polygons} features) and accessibility table ({records} rows) share no \
     spatial unit IDs"
)]
pub struct JoinMismatchError {
    /// Number of polygons in the layer
    pub polygons: usize,
    /// Number of accessibility records
    pub records: usize,
}

/// A unit of work (e.g. one region and time of day) which failed without stopping the run
#[derive(Debug)]
pub struct UnitFailure {
    /// Description of the unit, e.g. "auto_ratio: WAS, WEDAM"
    pub unit: String,
    /// Why it failed
    pub error: anyhow::Error,
}

impl UnitFailure {
    /// Create a new [`UnitFailure`], logging a warning
    pub fn new(unit: String, error: anyhow::Error) -> Self {
        warn!("Skipping {unit}: {error:#}");
        Self { unit, error }
    }
}

/// Log every failure of a stage at error level.
///
/// Returns an error summarising the failures if there were any.
pub fn report_failures(stage: &str, failures: &[UnitFailure]) -> Result<()> {
    for failure in failures {
        error!(
            "{stage} failed for {} ({}): {:#}",
            failure.unit,
            failure_kind(&failure.error),
            failure.error
        );
    }
    ensure!(
        failures.is_empty(),
        "{stage} failed for {} unit(s); other results were written",
        failures.len()
    );

    Ok(())
}

/// Describe which class of failure an error chain contains, for the end-of-run report
pub fn failure_kind(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.is::<DataQualityError>() {
            return "data quality";
        }
        if cause.is::<LookupMissError>() {
            return "lookup miss";
        }
        if cause.is::<JoinMismatchError>() {
            return "join mismatch";
        }
    }

    "input"
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_failure_kind() {
        let err = anyhow::Error::new(DataQualityError::EmptyScores);
        assert_eq!(failure_kind(&err), "data quality");

        let err: anyhow::Error = Err::<(), _>(LookupMissError {
            region: "WAS".into(),
            tod: "WEDAM".into(),
            p: 6,
        })
        .context("Failed to resolve domain")
        .unwrap_err();
        assert_eq!(failure_kind(&err), "lookup miss");

        assert_eq!(failure_kind(&anyhow::anyhow!("file not found")), "input");
    }

    #[test]
    fn test_report_failures() {
        assert!(report_failures("Sweep", &[]).is_ok());

        let failures = [UnitFailure::new(
            "auto_ratio: WAS, WEDAM".into(),
            DataQualityError::EmptyScores.into(),
        )];
        assert_eq!(
            report_failures("Sweep", &failures).unwrap_err().to_string(),
            "Sweep failed for 1 unit(s); other results were written"
        );
    }
}
