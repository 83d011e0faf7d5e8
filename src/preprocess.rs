//! Trial loading and preprocessing
//!
//! A raw trial file is a CSV time series with `Time` (ms), `Delta` (ms since
//! the previous sample) and any number of measurement columns. Preprocessing
//! rebases `Time` to start at zero and makes energy and power available in
//! both forms:
//!
//! - `{X}_ENERGY (J)` (cumulative) gets a per-step `DIFF_{X}_ENERGY (J)` and,
//!   when `{X}` has no power column, a derived `{X}_POWER (W)`
//! - `{X}_POWER (W|Watts)` without any energy column for `{X}` gets a derived
//!   `DIFF_{X}_ENERGY (J)`

use crate::columns::{DELTA, TIME};
use crate::error::{PipelineError, Result};
use crate::table::Table;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Prefix of per-step energy columns
pub const DIFF_PREFIX: &str = "DIFF_";

lazy_static! {
    static ref ENERGY_COLUMN: Regex =
        Regex::new(r"^(.+)_ENERGY \(J\)$").expect("energy column pattern is valid");
    static ref POWER_COLUMN: Regex =
        Regex::new(r"^(.+)_POWER \((W|Watts)\)$").expect("power column pattern is valid");
}

/// `DIFF_{X}_ENERGY (J)`
pub fn energy_step_column(category: &str) -> String {
    format!("{}{}_ENERGY (J)", DIFF_PREFIX, category)
}

fn energy_column(category: &str) -> String {
    format!("{}_ENERGY (J)", category)
}

fn power_columns(category: &str) -> [String; 2] {
    [
        format!("{}_POWER (W)", category),
        format!("{}_POWER (Watts)", category),
    ]
}

/// One measurement run, preprocessed and immutable
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    id: String,
    table: Table,
}

impl Trial {
    /// Preprocess `raw` into a trial called `id`
    pub fn new(id: impl Into<String>, raw: Table) -> Result<Self> {
        let id = id.into();
        let table = preprocess(&id, raw)?;
        Ok(Self { id, table })
    }

    /// Load and preprocess a raw trial file; the id is the file stem
    pub fn load(path: &Path) -> Result<Self> {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PipelineError::data(path.display().to_string(), "file name is not valid UTF-8")
            })?
            .to_string();

        let raw = Table::read_csv(path, None)?;
        debug!(trial = %id, rows = raw.row_count(), "loaded trial");
        Self::new(id, raw)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }
}

/// Rebase `Time` and derive the missing energy/power columns
///
/// # Errors
/// `Data` when `Time` or `Delta` is missing.
pub fn preprocess(trial_id: &str, mut table: Table) -> Result<Table> {
    for required in [TIME, DELTA] {
        if !table.has_column(required) {
            return Err(PipelineError::data(
                trial_id,
                format!("missing required column '{}'", required),
            ));
        }
    }

    rebase_time(&mut table)?;

    let delta: Vec<f64> = table.values(DELTA).unwrap_or_default().to_vec();
    let mut derived: Vec<(String, Vec<f64>)> = Vec::new();

    for column in table.columns() {
        if column.name.starts_with(DIFF_PREFIX) {
            continue;
        }

        if let Some(caps) = ENERGY_COLUMN.captures(&column.name) {
            let category = &caps[1];
            let step_name = energy_step_column(category);
            let steps = match table.values(&step_name) {
                Some(existing) => existing.to_vec(),
                None => {
                    let steps = energy_steps(&column.values);
                    derived.push((step_name, steps.clone()));
                    steps
                }
            };

            if !power_columns(category).iter().any(|p| table.has_column(p)) {
                let [power_name, _] = power_columns(category);
                let power = steps
                    .iter()
                    .zip(&delta)
                    .map(|(&energy, &delta_ms)| per_second(energy, delta_ms))
                    .collect();
                derived.push((power_name, power));
            }
        } else if let Some(caps) = POWER_COLUMN.captures(&column.name) {
            let category = &caps[1];
            let step_name = energy_step_column(category);
            if table.has_column(&energy_column(category)) || table.has_column(&step_name) {
                continue;
            }
            // two spellings of the unit can both be present
            if derived.iter().any(|(name, _)| *name == step_name) {
                continue;
            }
            let energy = column
                .values
                .iter()
                .zip(&delta)
                .map(|(&watts, &delta_ms)| zero_if_null(watts * delta_ms / 1000.0))
                .collect();
            derived.push((step_name, energy));
        }
    }

    for (name, values) in derived {
        debug!(trial = %trial_id, column = %name, "derived column");
        table.push_column(name, values)?;
    }

    Ok(table)
}

/// Shift `Time` so the earliest sample is at zero
fn rebase_time(table: &mut Table) -> Result<()> {
    let Some(time) = table.values(TIME) else {
        return Ok(());
    };
    let start = time
        .iter()
        .copied()
        .filter(|t| !t.is_nan())
        .fold(f64::INFINITY, f64::min);
    if !start.is_finite() {
        return Ok(());
    }

    let rebased: Vec<f64> = time.iter().map(|t| t - start).collect();
    table.replace_values(TIME, rebased)
}

/// Per-step differences of a cumulative series; the first step and any step
/// touching a null are 0
fn energy_steps(cumulative: &[f64]) -> Vec<f64> {
    let mut steps = Vec::with_capacity(cumulative.len());
    for (i, &value) in cumulative.iter().enumerate() {
        let step = if i == 0 { 0.0 } else { value - cumulative[i - 1] };
        steps.push(if step.is_nan() { 0.0 } else { step });
    }
    steps
}

/// Energy step (J) over `delta_ms` as watts; a zero or null interval yields 0
fn per_second(energy: f64, delta_ms: f64) -> f64 {
    if delta_ms == 0.0 || delta_ms.is_nan() {
        0.0
    } else {
        zero_if_null(energy / (delta_ms / 1000.0))
    }
}

fn zero_if_null(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> Table {
        Table::parse("raw", text, None).unwrap()
    }

    #[test]
    fn test_time_rebased_to_zero() {
        let table = preprocess("t", raw("Time,Delta\n1000,0\n1100,100\n1200,100\n")).unwrap();
        assert_eq!(table.values(TIME).unwrap(), &[0.0, 100.0, 200.0]);
    }

    #[test]
    fn test_energy_derives_steps_and_power() {
        let table = preprocess(
            "t",
            raw("Time,Delta,CPU_ENERGY (J)\n0,0,0\n100,100,5\n200,100,15\n300,100,30\n"),
        )
        .unwrap();

        assert_eq!(
            table.values("DIFF_CPU_ENERGY (J)").unwrap(),
            &[0.0, 5.0, 10.0, 15.0]
        );
        // 5 J over 100 ms = 50 W; Delta 0 gives 0
        assert_eq!(
            table.values("CPU_POWER (W)").unwrap(),
            &[0.0, 50.0, 100.0, 150.0]
        );
    }

    #[test]
    fn test_existing_power_not_overwritten() {
        let table = preprocess(
            "t",
            raw("Time,Delta,CPU_ENERGY (J),CPU_POWER (Watts)\n0,100,0,7\n100,100,1,8\n"),
        )
        .unwrap();
        assert!(!table.has_column("CPU_POWER (W)"));
        assert_eq!(table.values("CPU_POWER (Watts)").unwrap(), &[7.0, 8.0]);
        assert_eq!(table.values("DIFF_CPU_ENERGY (J)").unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_power_derives_energy_steps() {
        let table = preprocess(
            "t",
            raw("Time,Delta,CORE0_POWER (W)\n0,100,10\n100,200,20\n200,0,30\n"),
        )
        .unwrap();
        assert_eq!(
            table.values("DIFF_CORE0_ENERGY (J)").unwrap(),
            &[1.0, 4.0, 0.0]
        );
        assert!(!table.has_column("CORE0_ENERGY (J)"));
    }

    #[test]
    fn test_null_energy_step_is_zero() {
        let table = preprocess(
            "t",
            raw("Time,Delta,CPU_ENERGY (J)\n0,100,1\n100,100,\n200,100,4\n"),
        )
        .unwrap();
        assert_eq!(
            table.values("DIFF_CPU_ENERGY (J)").unwrap(),
            &[0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_null_delta_derives_zero() {
        let table = preprocess(
            "t",
            raw("Time,Delta,CPU_ENERGY (J),CORE0_POWER (W)\n0,100,0,10\n100,,5,20\n200,100,15,\n"),
        )
        .unwrap();
        assert_eq!(table.values("CPU_POWER (W)").unwrap(), &[0.0, 0.0, 100.0]);
        assert_eq!(
            table.values("DIFF_CORE0_ENERGY (J)").unwrap(),
            &[1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_missing_delta_is_data_error() {
        let err = preprocess("run_2", raw("Time,CPU_POWER (W)\n0,1\n")).unwrap_err();
        assert!(matches!(err, PipelineError::Data { .. }));
        assert!(err.to_string().contains("run_2"));
        assert!(err.to_string().contains("Delta"));
    }

    #[test]
    fn test_trial_load_uses_file_stem() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run_07.csv");
        std::fs::write(&path, "Time,Delta,CPU_POWER (W)\n5,0,1\n10,5,2\n").unwrap();

        let trial = Trial::load(&path).unwrap();
        assert_eq!(trial.id(), "run_07");
        assert_eq!(trial.row_count(), 2);
        assert_eq!(trial.table().values(TIME).unwrap(), &[0.0, 5.0]);
        assert!(trial.table().has_column("DIFF_CPU_ENERGY (J)"));
    }
}
