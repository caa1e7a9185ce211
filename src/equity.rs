//! Foster-Greer-Thorbecke (FGT) poverty indices per demographic group.
//!
//! The sweep treats the equity computation as a collaborator behind [`EquityComputer`]. The
//! population-weighted [`FgtComputer`] is the implementation used by the program.
use crate::access::Access;
use crate::demographic::{Demographics, GroupID};
use crate::error::DataQualityError;
use crate::poverty_line::PovertyLine;
use anyhow::{Result, bail};
use indexmap::IndexMap;
use strum::EnumIter;

/// The FGT order (α): 0 for headcount, 1 for poverty gap and 2 for squared poverty gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum FgtOrder {
    /// Share of the population below the poverty line
    Headcount,
    /// Mean normalised shortfall below the poverty line
    Gap,
    /// Mean squared normalised shortfall, weighting severity
    SquaredGap,
}

impl FgtOrder {
    /// The value of α for this order
    pub fn alpha(self) -> i32 {
        match self {
            Self::Headcount => 0,
            Self::Gap => 1,
            Self::SquaredGap => 2,
        }
    }
}

/// One index value per demographic group
pub type GroupValues = IndexMap<GroupID, f64>;

/// Computes poverty indices for each demographic group
pub trait EquityComputer {
    /// Compute the FGT index of order `order` for each group.
    ///
    /// # Arguments
    ///
    /// * `access` - The score column to analyse
    /// * `demographics` - Group populations for each spatial unit
    /// * `poverty_line` - Units scoring strictly below this are counted as poor
    /// * `order` - The FGT order
    fn fgt_poverty(
        &self,
        access: &Access,
        demographics: &Demographics,
        poverty_line: PovertyLine,
        order: FgtOrder,
    ) -> Result<GroupValues>;
}

/// Population-weighted FGT indices.
///
/// For group g with population `w_i` in spatial unit i with score `s_i`:
///
/// `FGT_α(g) = Σ w_i · 1[s_i < z] · ((z − s_i) / z)^α / Σ w_i`
///
/// A score exactly on the poverty line is not counted as poor. Only spatial units present in both
/// the score column and the demographic table are considered.
#[derive(Debug, Default, Clone, Copy)]
pub struct FgtComputer;

impl EquityComputer for FgtComputer {
    fn fgt_poverty(
        &self,
        access: &Access,
        demographics: &Demographics,
        poverty_line: PovertyLine,
        order: FgtOrder,
    ) -> Result<GroupValues> {
        let z = poverty_line.0;
        let alpha = order.alpha();
        let n_groups = demographics.groups().len();
        let mut totals = vec![0.0; n_groups];
        let mut poor = vec![0.0; n_groups];
        let mut overlap = 0usize;

        for (unit, score) in access.iter() {
            let Some(populations) = demographics.get(unit) else {
                continue;
            };
            overlap += 1;

            // Nothing is strictly below a non-positive line
            let shortfall = if z > 0.0 && score < z {
                Some(((z - score) / z).powi(alpha))
            } else {
                None
            };

            for (idx, population) in populations.iter().enumerate() {
                totals[idx] += population;
                if let Some(shortfall) = shortfall {
                    poor[idx] += population * shortfall;
                }
            }
        }

        if overlap == 0 {
            bail!(DataQualityError::NoDemographicOverlap);
        }

        Ok(demographics
            .groups()
            .iter()
            .zip(totals.into_iter().zip(poor))
            .map(|(group, (total, poor))| {
                let value = if total > 0.0 { poor / total } else { 0.0 };
                (group.clone(), value)
            })
            .collect())
    }
}
