//! Per-trial scalar metrics
//!
//! Each trial collapses to one row: total energy and peak power for the whole
//! CPU, then for every core. Rows are indexed by trial id.

use crate::columns::TRIAL_INDEX;
use crate::error::{PipelineError, Result};
use crate::measurement::{MeasurementType, ScalarKind, ScalarMetric, Scope};
use crate::preprocess::{Trial, DIFF_PREFIX};
use crate::table::Table;

/// Sum of per-step energy
///
/// Prefers a `DIFF_` step column; falls back to differencing the cumulative
/// column. Null steps count as 0.
fn total_energy(table: &Table, scope: Scope) -> Option<f64> {
    let step_names: Vec<&str> = table
        .column_names()
        .filter_map(|name| name.strip_prefix(DIFF_PREFIX))
        .collect();

    if let Some(base) = energy_column_in(&step_names, scope) {
        let steps = table.values(&format!("{}{}", DIFF_PREFIX, base))?;
        return Some(steps.iter().filter(|v| !v.is_nan()).sum());
    }

    let names: Vec<&str> = table
        .column_names()
        .filter(|name| !name.starts_with(DIFF_PREFIX))
        .collect();
    let cumulative = table.values(energy_column_in(&names, scope)?)?;
    Some(
        cumulative
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|step| !step.is_nan())
            .sum(),
    )
}

fn energy_column_in<'a>(names: &[&'a str], scope: Scope) -> Option<&'a str> {
    match scope {
        Scope::Cpu => MeasurementType::CpuEnergy.find_in(names),
        Scope::Core(core) => names
            .iter()
            .copied()
            .find(|name| MeasurementType::CoreEnergy.core_number(name) == Some(core)),
    }
}

/// Highest sample of the power column, `NaN` when every sample is null
fn peak_power(table: &Table, scope: Scope) -> Option<f64> {
    let column = match scope {
        Scope::Cpu => MeasurementType::CpuPower.find_column(table)?,
        Scope::Core(core) => MeasurementType::CorePower.find_core_column(table, core)?,
    };
    let peak = table
        .values(column)?
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    Some(if peak == f64::NEG_INFINITY { f64::NAN } else { peak })
}

/// Value of one scalar metric for a trial, `None` when its column is missing
pub fn scalar_value(trial: &Trial, metric: ScalarMetric) -> Option<f64> {
    match metric.kind {
        ScalarKind::TotalEnergy => total_energy(trial.table(), metric.scope),
        ScalarKind::PeakPower => peak_power(trial.table(), metric.scope),
    }
}

/// Trial-summary table, one row per trial in id order
///
/// # Errors
/// `Data` naming the trial and measurement when a whole-CPU energy or power
/// column is missing. Missing per-core columns produce nulls.
pub fn summarize_trials(trials: &[Trial], core_count: usize) -> Result<Table> {
    let mut ordered: Vec<&Trial> = trials.iter().collect();
    ordered.sort_by(|a, b| a.id().cmp(b.id()));

    let labels = ordered.iter().map(|t| t.id().to_string()).collect();
    let mut table = Table::with_index(TRIAL_INDEX, labels);

    for metric in ScalarMetric::summary_set(core_count) {
        let mut values = Vec::with_capacity(ordered.len());
        for trial in &ordered {
            let value = match (scalar_value(trial, metric), metric.scope) {
                (Some(value), _) => value,
                (None, Scope::Core(_)) => f64::NAN,
                (None, Scope::Cpu) => {
                    return Err(PipelineError::data(
                        trial.id(),
                        format!(
                            "no {:?} column for {}",
                            metric.source(),
                            metric.column_name()
                        ),
                    ))
                }
            };
            values.push(value);
        }
        table.push_column(metric.column_name(), values)?;
    }

    Ok(table)
}
