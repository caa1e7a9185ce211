//! The sensitivity sweep: poverty indices for every region, time of day and poverty-line parameter.
use crate::access::{Access, AccessTable, ScoreKind};
use crate::demographic::{Demographics, GroupID};
use crate::equity::{EquityComputer, FgtComputer, FgtOrder, GroupValues};
use crate::error::{DataQualityError, UnitFailure, report_failures};
use crate::output::ResultWriter;
use crate::poverty_line::{LineContext, LineMode, Percent, PovertyLine, PovertyLineStrategy};
use crate::project::{Project, SweepSource};
use crate::region::RegionID;
use crate::time_of_day::TimeOfDayID;
use anyhow::{Result, bail};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use std::path::Path;

pub mod accumulator;
pub use accumulator::{SweepAccumulator, SweepRow, ThresholdLookupRow};

/// The result of a sweep
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Rows for every region and time of day which succeeded, for each strategy in sweep order
    pub accumulators: IndexMap<LineMode, SweepAccumulator>,
    /// Regions and times of day which were skipped
    pub failures: Vec<UnitFailure>,
}

/// Drives poverty-line strategies over the region × time of day × parameter grid.
///
/// Each region's inputs are loaded once and shared by every strategy.
pub struct SweepOrchestrator<'a> {
    strategies: Vec<Box<dyn PovertyLineStrategy>>,
    computer: &'a dyn EquityComputer,
    percents: Vec<Percent>,
}

impl<'a> SweepOrchestrator<'a> {
    /// Create a new [`SweepOrchestrator`].
    ///
    /// # Arguments
    ///
    /// * `strategies` - How poverty lines are derived from the parameter, one set of tables each
    /// * `computer` - Computes poverty indices for each demographic group
    /// * `percents` - The parameters to sweep, in output order
    pub fn new(
        strategies: Vec<Box<dyn PovertyLineStrategy>>,
        computer: &'a dyn EquityComputer,
        percents: Vec<Percent>,
    ) -> Self {
        Self {
            strategies,
            computer,
            percents,
        }
    }

    /// Sweep every region and time of day provided by `source`.
    ///
    /// A failure discards the results of the affected region (or region and time of day) only.
    /// Failures to load inputs affect every strategy, while a strategy rejecting its inputs only
    /// affects that strategy.
    pub fn run(&self, source: &impl SweepSource) -> SweepOutcome {
        let mut outcome = SweepOutcome {
            accumulators: self
                .strategies
                .iter()
                .map(|strategy| (strategy.mode(), SweepAccumulator::default()))
                .collect(),
            failures: Vec::new(),
        };

        for region in source.regions() {
            info!("Sweeping region {region}");
            if let Err(err) = self.sweep_region(source, &region, &mut outcome) {
                outcome
                    .failures
                    .push(UnitFailure::new(region.to_string(), err));
            }
        }

        outcome
    }

    fn sweep_region(
        &self,
        source: &impl SweepSource,
        region: &RegionID,
        outcome: &mut SweepOutcome,
    ) -> Result<()> {
        let supply = source.load_supply(region)?;
        let demographics = source.load_demographics(region)?;
        let total_supply = supply.total();

        let mut strategies = Vec::new();
        for strategy in &self.strategies {
            match strategy.check_region(region, total_supply) {
                Ok(()) => strategies.push(strategy.as_ref()),
                Err(err) => outcome.failures.push(UnitFailure::new(
                    format!("{}: {region}", strategy.mode()),
                    err,
                )),
            }
        }
        if strategies.is_empty() {
            return Ok(());
        }

        for tod in source.times_of_day() {
            let table = match source.load_access(region, &tod) {
                Ok(table) => table,
                Err(err) => {
                    outcome
                        .failures
                        .push(UnitFailure::new(format!("{region}, {tod}"), err));
                    continue;
                }
            };

            for &strategy in &strategies {
                let mode = strategy.mode();
                match self.sweep_time_of_day(
                    strategy,
                    region,
                    &tod,
                    &table,
                    total_supply,
                    &demographics,
                ) {
                    Ok(buffer) => outcome.accumulators[&mode].merge(buffer),
                    Err(err) => outcome
                        .failures
                        .push(UnitFailure::new(format!("{mode}: {region}, {tod}"), err)),
                }
            }
        }

        Ok(())
    }

    fn sweep_time_of_day(
        &self,
        strategy: &dyn PovertyLineStrategy,
        region: &RegionID,
        tod: &TimeOfDayID,
        table: &AccessTable,
        total_supply: f64,
        demographics: &Demographics,
    ) -> Result<SweepAccumulator> {
        let scores = Access::from_table(table, strategy.score_kind())?;
        log_score_range(strategy, region, tod, &scores, total_supply);

        let context = LineContext::new(total_supply, &scores);
        strategy.check_context(&context)?;

        let mut buffer = SweepAccumulator::default();
        for &p in &self.percents {
            let line = strategy.value(p, &context);
            debug!("{region}, {tod} ({}): p = {p}, poverty line = {line}", strategy.mode());
            buffer.push_line(region, tod, p, line);

            for (group, [fgt0, fgt1, fgt2]) in self.compute_indices(&scores, demographics, line)? {
                buffer.push_result(SweepRow {
                    group,
                    fgt0,
                    fgt1,
                    fgt2,
                    region: region.clone(),
                    tod: tod.clone(),
                    p,
                });
            }
        }

        Ok(buffer)
    }

    /// Compute all three FGT orders for one poverty line, joined on group
    fn compute_indices(
        &self,
        scores: &Access,
        demographics: &Demographics,
        line: PovertyLine,
    ) -> Result<Vec<(GroupID, [f64; 3])>> {
        let compute = |order| self.computer.fgt_poverty(scores, demographics, line, order);
        let headcount = compute(FgtOrder::Headcount)?;
        let gap = compute(FgtOrder::Gap)?;
        let squared_gap = compute(FgtOrder::SquaredGap)?;
        join_orders(headcount, &gap, &squared_gap)
    }
}

fn log_score_range(
    strategy: &dyn PovertyLineStrategy,
    region: &RegionID,
    tod: &TimeOfDayID,
    scores: &Access,
    total_supply: f64,
) {
    let Some((min, max)) = scores.min_max() else {
        warn!("{region}, {tod}: no accessibility scores");
        return;
    };

    match strategy.score_kind() {
        ScoreKind::Ratio => info!(
            "{region}, {tod}: transit access is {:.2}% to {:.2}% of auto access",
            min * 100.0,
            max * 100.0
        ),
        ScoreKind::Absolute if total_supply > 0.0 => info!(
            "{region}, {tod}: transit access is {min} to {max} jobs \
             ({:.2}% to {:.2}% of {total_supply} jobs)",
            min / total_supply * 100.0,
            max / total_supply * 100.0
        ),
        ScoreKind::Absolute => info!("{region}, {tod}: transit access is {min} to {max} jobs"),
    }
}

/// Inner join of the three FGT orders on group, in headcount group order.
///
/// A group missing from any order is an error.
fn join_orders(
    headcount: GroupValues,
    gap: &GroupValues,
    squared_gap: &GroupValues,
) -> Result<Vec<(GroupID, [f64; 3])>> {
    for values in [gap, squared_gap] {
        if let Some(group) = values.keys().find(|group| !headcount.contains_key(*group)) {
            bail!(DataQualityError::GroupMismatch {
                group: group.to_string(),
                alpha: FgtOrder::Headcount.alpha(),
            });
        }
    }

    let lookup = |values: &GroupValues, group: &GroupID, order: FgtOrder| -> Result<f64> {
        match values.get(group) {
            Some(value) => Ok(*value),
            None => bail!(DataQualityError::GroupMismatch {
                group: group.to_string(),
                alpha: order.alpha(),
            }),
        }
    };

    headcount
        .into_iter()
        .map(|(group, fgt0)| {
            let fgt1 = lookup(gap, &group, FgtOrder::Gap)?;
            let fgt2 = lookup(squared_gap, &group, FgtOrder::SquaredGap)?;
            Ok((group, [fgt0, fgt1, fgt2]))
        })
        .collect()
}

/// Run every configured poverty-line strategy over the project and write the results.
///
/// Each strategy's tables are written even if some regions or times of day failed. An error is
/// returned afterwards if anything failed.
///
/// # Arguments
///
/// * `project` - The project to sweep
/// * `output_path` - The folder to which output files will be written
pub fn run_sweep(project: &Project, output_path: &Path) -> Result<()> {
    let modes = &project.parameters.sweep.strategies;
    info!("Sweeping poverty lines: {}", modes.iter().join(", "));
    let orchestrator = SweepOrchestrator::new(
        modes.iter().map(|mode| mode.strategy()).collect(),
        &FgtComputer,
        project.parameters.sweep.percents()?,
    );
    let outcome = orchestrator.run(project);

    let writer = ResultWriter::new(output_path);
    for (mode, accumulator) in &outcome.accumulators {
        writer.write(mode.output_stem(), accumulator)?;
        info!(
            "Wrote {} result rows and {} poverty lines for {mode}",
            accumulator.results().len(),
            accumulator.lines().len()
        );
    }

    report_failures("Sweep", &outcome.failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessRecord;
    use crate::error::failure_kind;
    use crate::fixture::{access_table, demographics};
    use crate::poverty_line::{MAX_PERCENT, MIN_PERCENT};
    use crate::supply::Supply;
    use anyhow::Context;
    use float_cmp::assert_approx_eq;
    use indexmap::{IndexMap, indexmap, indexset};
    use itertools::assert_equal;
    use std::cell::Cell;
    use std::collections::HashMap;
    use strum::IntoEnumIterator;

    /// Input tables held in memory
    #[derive(Default)]
    struct MemorySource {
        inputs: IndexMap<RegionID, (Supply, Demographics)>,
        tods: Vec<TimeOfDayID>,
        access: HashMap<(RegionID, TimeOfDayID), AccessTable>,
        /// Number of tables loaded
        loads: Cell<usize>,
    }

    impl MemorySource {
        fn count_load(&self) {
            self.loads.set(self.loads.get() + 1);
        }
    }

    impl SweepSource for MemorySource {
        fn regions(&self) -> Vec<RegionID> {
            self.inputs.keys().cloned().collect()
        }

        fn times_of_day(&self) -> Vec<TimeOfDayID> {
            self.tods.clone()
        }

        fn load_supply(&self, region: &RegionID) -> Result<Supply> {
            self.count_load();
            Ok(self.inputs[region].0.clone())
        }

        fn load_demographics(&self, region: &RegionID) -> Result<Demographics> {
            self.count_load();
            Ok(self.inputs[region].1.clone())
        }

        fn load_access(&self, region: &RegionID, tod: &TimeOfDayID) -> Result<AccessTable> {
            self.count_load();
            self.access
                .get(&(region.clone(), tod.clone()))
                .cloned()
                .with_context(|| format!("No scores for {region}, {tod}"))
        }
    }

    /// Every region gets the same supply, demographics and scores
    fn synthetic_source(regions: &[&str], tods: &[&str]) -> MemorySource {
        let supply = Supply::new(indexmap! {
            "A".into() => 200.0,
            "B".into() => 300.0,
            "C".into() => 500.0,
        });

        let mut source = MemorySource {
            tods: tods.iter().map(|&tod| tod.into()).collect(),
            ..Default::default()
        };
        for &region in regions {
            source
                .inputs
                .insert(region.into(), (supply.clone(), demographics()));
            for &tod in tods {
                source
                    .access
                    .insert((region.into(), tod.into()), access_table());
            }
        }

        source
    }

    fn all_percents() -> Vec<Percent> {
        Percent::range(
            Percent::new(MIN_PERCENT).unwrap(),
            Percent::new(MAX_PERCENT).unwrap(),
        )
        .collect()
    }

    /// The outcome of sweeping a single strategy
    struct ModeOutcome {
        accumulator: SweepAccumulator,
        failures: Vec<UnitFailure>,
    }

    fn sweep_with(
        mode: LineMode,
        computer: &dyn EquityComputer,
        percents: Vec<Percent>,
        source: &MemorySource,
    ) -> ModeOutcome {
        let SweepOutcome {
            mut accumulators,
            failures,
        } = SweepOrchestrator::new(vec![mode.strategy()], computer, percents).run(source);
        assert_equal(accumulators.keys().copied(), [mode]);
        ModeOutcome {
            accumulator: accumulators.swap_remove(&mode).unwrap(),
            failures,
        }
    }

    fn sweep(mode: LineMode, source: &MemorySource) -> ModeOutcome {
        sweep_with(mode, &FgtComputer, all_percents(), source)
    }

    fn sweep_all(source: &MemorySource) -> SweepOutcome {
        let strategies = LineMode::iter().map(LineMode::strategy).collect();
        SweepOrchestrator::new(strategies, &FgtComputer, all_percents()).run(source)
    }

    #[test]
    fn test_row_counts() {
        let source = synthetic_source(&["WAS", "BOS"], &["WEDAM", "WEDPM", "SATAM"]);
        for mode in LineMode::iter() {
            let outcome = sweep(mode, &source);
            assert!(outcome.failures.is_empty());
            assert_eq!(outcome.accumulator.results().len(), 2 * 3 * 100 * 2);
            assert_eq!(outcome.accumulator.lines().len(), 2 * 3 * 100);
        }
    }

    #[test]
    fn test_inputs_loaded_once() {
        let source = synthetic_source(&["WAS", "BOS"], &["WEDAM", "SATAM"]);
        let outcome = sweep_all(&source);
        assert!(outcome.failures.is_empty());

        // Supply and demographics per region, then scores per time of day
        assert_eq!(source.loads.get(), 2 * 2 + 2 * 2);

        // Each strategy still gets its own tables, in sweep order
        assert_equal(outcome.accumulators.keys().copied(), LineMode::iter());
        for (mode, accumulator) in &outcome.accumulators {
            assert_eq!(*accumulator, sweep(*mode, &source).accumulator);
        }
    }

    #[test]
    fn test_row_order() {
        let source = synthetic_source(&["WAS", "BOS"], &["WEDAM", "SATAM"]);
        let outcome = sweep(LineMode::AutoRatio, &source);
        let lines = outcome.accumulator.lines();
        let first = &lines[0];
        assert_eq!(
            (&*first.region.0, &*first.tod.0, first.p.get()),
            ("WAS", "WEDAM", 1)
        );
        let last = lines.last().unwrap();
        assert_eq!(
            (&*last.region.0, &*last.tod.0, last.p.get()),
            ("BOS", "SATAM", 100)
        );

        // Groups in demographic column order for each grid point
        let groups: Vec<_> = outcome.accumulator.results()[..2]
            .iter()
            .map(|row| row.group.to_string())
            .collect();
        assert_eq!(groups, ["total", "low_income"]);
    }

    #[test]
    fn test_headcount_monotonic_over_grid() {
        let source = synthetic_source(&["WAS", "BOS"], &["WEDAM", "WEDPM"]);
        for mode in LineMode::iter() {
            let outcome = sweep(mode, &source);
            let by_series = outcome
                .accumulator
                .results()
                .iter()
                .into_group_map_by(|row| (row.region.clone(), row.tod.clone(), row.group.clone()));
            for rows in by_series.values() {
                assert_eq!(rows.len(), 100);
                assert!(rows.windows(2).all(|w| w[0].p < w[1].p));
                assert!(rows.windows(2).all(|w| w[0].fgt0 <= w[1].fgt0));
            }
        }
    }

    #[test]
    fn test_lines_follow_strategy() {
        let source = synthetic_source(&["WAS"], &["WEDAM"]);

        let outcome = sweep(LineMode::FractionOfSupply, &source);
        let values: Vec<_> = outcome.accumulator.lines().iter().map(|r| r.value).collect();
        assert_approx_eq!(f64, values[0], 10.0);
        assert_approx_eq!(f64, values[99], 1000.0);

        let outcome = sweep(LineMode::AutoRatio, &source);
        assert_eq!(outcome.accumulator.lines()[44].value, 0.45);
    }

    #[test]
    fn test_zero_supply_aborts_region() {
        let mut source = synthetic_source(&["WAS", "BOS"], &["WEDAM"]);
        source.inputs["WAS"].0 = Supply::default();

        let outcome = sweep(LineMode::FractionOfSupply, &source);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].unit, "fraction_of_supply: WAS");
        assert_eq!(failure_kind(&outcome.failures[0].error), "data quality");
        assert!(outcome.accumulator.lines().iter().all(|row| &*row.region.0 == "BOS"));
        assert_eq!(outcome.accumulator.lines().len(), 100);

        // Ratios don't depend on supply
        let outcome = sweep(LineMode::AutoRatio, &source);
        assert!(outcome.failures.is_empty());

        // Only the strategy needing supply loses the region when swept together
        let outcome = sweep_all(&source);
        assert_equal(
            outcome.failures.iter().map(|failure| failure.unit.as_str()),
            ["fraction_of_supply: WAS"],
        );
        assert_eq!(outcome.accumulators[&LineMode::FractionOfSupply].lines().len(), 100);
        assert_eq!(outcome.accumulators[&LineMode::AutoRatio].lines().len(), 200);
    }

    #[test]
    fn test_zero_auto_access_discards_time_of_day() {
        let mut source = synthetic_source(&["WAS"], &["WEDAM", "WEDPM"]);
        source
            .access
            .get_mut(&(RegionID::new("WAS"), TimeOfDayID::new("WEDPM")))
            .unwrap()
            .insert(
                "D".into(),
                AccessRecord {
                    transit: 10.0,
                    auto: 0.0,
                },
            );

        let outcome = sweep(LineMode::AutoRatio, &source);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].unit, "auto_ratio: WAS, WEDPM");
        assert!(
            outcome
                .accumulator
                .results()
                .iter()
                .all(|row| &*row.tod.0 == "WEDAM")
        );
        assert_eq!(outcome.accumulator.results().len(), 100 * 2);
    }

    #[test]
    fn test_missing_scores_discards_time_of_day() {
        let mut source = synthetic_source(&["WAS"], &["WEDAM", "WEDPM"]);
        source
            .access
            .remove(&(RegionID::new("WAS"), TimeOfDayID::new("WEDAM")));

        let outcome = sweep(LineMode::Percentile, &source);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(failure_kind(&outcome.failures[0].error), "input");
        assert_eq!(outcome.accumulator.lines().len(), 100);

        // A missing input is reported once, not once per strategy
        let outcome = sweep_all(&source);
        assert_equal(
            outcome.failures.iter().map(|failure| failure.unit.as_str()),
            ["WAS, WEDAM"],
        );
        assert!(outcome.accumulators.values().all(|acc| acc.lines().len() == 100));
    }

    /// Drops a group from the squared gap results
    struct InconsistentComputer;

    impl EquityComputer for InconsistentComputer {
        fn fgt_poverty(
            &self,
            access: &Access,
            demographics: &Demographics,
            poverty_line: PovertyLine,
            order: FgtOrder,
        ) -> Result<GroupValues> {
            let mut values = FgtComputer.fgt_poverty(access, demographics, poverty_line, order)?;
            if order == FgtOrder::SquaredGap {
                values.shift_remove("low_income");
            }
            Ok(values)
        }
    }

    #[test]
    fn test_group_mismatch() {
        let source = synthetic_source(&["WAS"], &["WEDAM"]);
        let outcome = sweep_with(
            LineMode::AutoRatio,
            &InconsistentComputer,
            all_percents(),
            &source,
        );
        assert!(outcome.accumulator.results().is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(
            outcome.failures[0].error.downcast_ref::<DataQualityError>(),
            Some(&DataQualityError::GroupMismatch {
                group: "low_income".into(),
                alpha: 2
            })
        );
    }

    #[test]
    fn test_join_orders_extra_group() {
        let headcount = indexmap! {GroupID::new("total") => 0.5};
        let gap = indexmap! {GroupID::new("total") => 0.2, GroupID::new("other") => 0.1};
        assert!(join_orders(headcount.clone(), &headcount, &headcount).is_ok());
        assert!(join_orders(headcount.clone(), &gap, &headcount).is_err());
    }

    #[test]
    fn test_idempotent() {
        let source = synthetic_source(&["WAS", "BOS"], &["WEDAM"]);
        for mode in LineMode::iter() {
            assert_eq!(sweep(mode, &source).accumulator, sweep(mode, &source).accumulator);
        }
    }

    #[test]
    fn test_score_on_poverty_line() {
        // One unit reaching 450 of the region's 1000 jobs
        let region = RegionID::new("WAS");
        let tod = TimeOfDayID::new("WEDAM");
        let source = MemorySource {
            inputs: indexmap! {
                region.clone() => (
                    Supply::new(indexmap! {"A".into() => 1000.0}),
                    Demographics::new(
                        indexset! {"total".into()},
                        indexmap! {"A".into() => vec![1.0]},
                    )
                    .unwrap(),
                )
            },
            tods: vec![tod.clone()],
            access: HashMap::from([(
                (region, tod),
                indexmap! {"A".into() => AccessRecord { transit: 450.0, auto: 900.0 }},
            )]),
            ..Default::default()
        };

        let p = Percent::new(45).unwrap();
        let outcome = sweep_with(LineMode::FractionOfSupply, &FgtComputer, vec![p], &source);
        assert_eq!(outcome.accumulator.lines()[0].value, 450.0);
        let row = &outcome.accumulator.results()[0];
        assert_eq!(row.p, p);
        assert_eq!(row.fgt0, 0.0);
    }
}
