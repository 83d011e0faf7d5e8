//! Per-timestamp aggregation of a group's trials
//!
//! Trials are aligned by row position against the longest trial. Positions a
//! shorter trial does not reach count as 0, as do non-finite samples.
//! Timestamps are not interpolated.

use crate::columns::{stat_column, trial_column, Statistic, DELTA, TIME};
use crate::error::{PipelineError, Result};
use crate::preprocess::Trial;
use crate::statistics::Summary;
use crate::table::Table;
use tracing::debug;

/// Trial whose timeline the aggregate uses: most rows, first on ties
pub fn reference_trial(trials: &[Trial]) -> Option<&Trial> {
    trials.iter().reduce(|best, trial| {
        if trial.row_count() > best.row_count() {
            trial
        } else {
            best
        }
    })
}

/// Every trial column side by side as `{trial_id}:{column}`, `rows` long
pub fn wide_table(trials: &[Trial], rows: usize) -> Result<Table> {
    let mut wide = Table::new();
    for trial in trials {
        for column in trial.table().columns() {
            let values = (0..rows)
                .map(|row| match column.values.get(row) {
                    Some(v) if v.is_finite() => *v,
                    _ => 0.0,
                })
                .collect();
            wide.push_column(trial_column(trial.id(), &column.name), values)?;
        }
    }
    Ok(wide)
}

/// Aggregate table of a group
///
/// Output columns: `Time`, `Delta` (reference trial, truncated to integers),
/// then the seven statistics of every other reference column, computed
/// row-wise over the trials that have that column.
///
/// # Errors
/// `Configuration` for an empty trial list.
pub fn aggregate(group: &str, trials: &[Trial]) -> Result<Table> {
    let reference = reference_trial(trials).ok_or_else(|| {
        PipelineError::configuration(format!("group '{}' has no trials to aggregate", group))
    })?;
    let rows = reference.row_count();
    debug!(group, reference = reference.id(), rows, "aggregating trials");

    let wide = wide_table(trials, rows)?;
    let mut output = Table::new();

    for name in [TIME, DELTA] {
        let timeline: Vec<f64> = reference
            .table()
            .values(name)
            .unwrap_or_default()
            .iter()
            .map(|v| v.trunc())
            .collect();
        output.push_column(name, timeline)?;
    }

    for base in reference.table().column_names() {
        if base == TIME || base == DELTA {
            continue;
        }

        let sources: Vec<&[f64]> = trials
            .iter()
            .filter_map(|trial| wide.values(&trial_column(trial.id(), base)))
            .collect();

        let summaries: Vec<Summary> = (0..rows)
            .map(|row| {
                let samples: Vec<f64> = sources.iter().map(|values| values[row]).collect();
                Summary::of(&samples)
            })
            .collect();

        for statistic in Statistic::ALL {
            let values = summaries.iter().map(|s| s.get(statistic)).collect();
            output.push_column(stat_column(base, statistic), values)?;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(id: &str, text: &str) -> Trial {
        Trial::new(id, Table::parse(id, text, None).unwrap()).unwrap()
    }

    #[test]
    fn test_single_timestamp_statistics() {
        let trials = vec![
            trial("a", "Time,Delta,X\n0,0,10\n"),
            trial("b", "Time,Delta,X\n0,0,20\n"),
            trial("c", "Time,Delta,X\n0,0,30\n"),
        ];
        let table = aggregate("g", &trials).unwrap();

        assert_eq!(table.value("X_mean", 0), Some(20.0));
        assert_eq!(table.value("X_median", 0), Some(20.0));
        assert_eq!(table.value("X_LQ", 0), Some(15.0));
        assert_eq!(table.value("X_UQ", 0), Some(25.0));
        assert_eq!(table.value("X_min", 0), Some(10.0));
        assert_eq!(table.value("X_max", 0), Some(30.0));
    }

    #[test]
    fn test_column_order() {
        let trials = vec![trial("a", "Time,Delta,X,Y\n0,0,1,2\n")];
        let table = aggregate("g", &trials).unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(
            names,
            vec![
                "Time", "Delta", "X_mean", "X_std", "X_median", "X_min", "X_max", "X_LQ", "X_UQ",
                "Y_mean", "Y_std", "Y_median", "Y_min", "Y_max", "Y_LQ", "Y_UQ",
            ]
        );
    }

    #[test]
    fn test_short_trials_zero_filled() {
        let trials = vec![
            trial("short", "Time,Delta,X\n0,0,4\n"),
            trial("long", "Time,Delta,X\n0,0,2\n100,100,6\n"),
        ];
        let table = aggregate("g", &trials).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.values("Time").unwrap(), &[0.0, 100.0]);
        assert_eq!(table.value("X_mean", 0), Some(3.0));
        // second row: short trial contributes 0
        assert_eq!(table.value("X_mean", 1), Some(3.0));
        assert_eq!(table.value("X_min", 1), Some(0.0));
    }

    #[test]
    fn test_reference_first_on_ties() {
        let trials = vec![
            trial("first", "Time,Delta\n0,0\n10,10\n"),
            trial("second", "Time,Delta\n0,0\n20,20\n"),
        ];
        assert_eq!(reference_trial(&trials).unwrap().id(), "first");
    }

    #[test]
    fn test_timeline_truncated() {
        let trials = vec![trial("a", "Time,Delta,X\n0,0,1\n100.7,100.7,1\n")];
        let table = aggregate("g", &trials).unwrap();
        assert_eq!(table.values("Time").unwrap(), &[0.0, 100.0]);
        assert_eq!(table.values("Delta").unwrap(), &[0.0, 100.0]);
    }

    #[test]
    fn test_single_trial_std_is_null() {
        let trials = vec![trial("a", "Time,Delta,X\n0,0,5\n")];
        let table = aggregate("g", &trials).unwrap();
        assert_eq!(table.value("X_std", 0), None);
        assert_eq!(table.value("X_mean", 0), Some(5.0));
    }

    #[test]
    fn test_only_trials_with_column_contribute() {
        let trials = vec![
            trial("a", "Time,Delta,X\n0,0,10\n"),
            trial("b", "Time,Delta\n0,0\n"),
        ];
        let table = aggregate("g", &trials).unwrap();
        assert_eq!(table.value("X_mean", 0), Some(10.0));
    }

    #[test]
    fn test_non_finite_values_become_zero() {
        let trials = vec![
            trial("a", "Time,Delta,X\n0,0,inf\n"),
            trial("b", "Time,Delta,X\n0,0,\n"),
            trial("c", "Time,Delta,X\n0,0,6\n"),
        ];
        let table = aggregate("g", &trials).unwrap();
        assert_eq!(table.value("X_mean", 0), Some(2.0));
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = aggregate("empty", &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
