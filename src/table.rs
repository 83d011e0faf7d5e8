//! Column-oriented numeric tables with CSV persistence
//!
//! All pipeline artifacts are tables of `f64` columns, optionally keyed by a
//! string row index (trial ids in the trial summary). Missing values are
//! stored as `NaN` and written as empty cells; infinities round-trip as
//! `inf` / `-inf`.

use crate::error::{PipelineError, Result};
use std::fs;
use std::path::Path;

/// A named column of numeric values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// String labels identifying each row
#[derive(Debug, Clone, PartialEq)]
pub struct RowIndex {
    pub name: String,
    pub labels: Vec<String>,
}

/// In-memory table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    index: Option<RowIndex>,
    columns: Vec<Column>,
}

impl Table {
    /// Create an empty table without a row index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table whose rows are keyed by `labels`
    pub fn with_index(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            index: Some(RowIndex {
                name: name.into(),
                labels,
            }),
            columns: Vec::new(),
        }
    }

    pub fn index(&self) -> Option<&RowIndex> {
        self.index.as_ref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.column(name).map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Number of rows (index length when indexed, else first column length)
    pub fn row_count(&self) -> usize {
        match (&self.index, self.columns.first()) {
            (Some(index), _) => index.labels.len(),
            (None, Some(column)) => column.values.len(),
            (None, None) => 0,
        }
    }

    /// Whether the table has no columns at all
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value at `row` of column `name`, `None` when absent or null
    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.values(name)
            .and_then(|values| values.get(row).copied())
            .filter(|v| !v.is_nan())
    }

    /// Append a column
    ///
    /// # Errors
    /// Fails on duplicate names or when the length disagrees with the rows
    /// already present.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(PipelineError::data(
                "table",
                format!("duplicate column '{}'", name),
            ));
        }

        let expected = self.row_count();
        let has_rows = self.index.is_some() || !self.columns.is_empty();
        if has_rows && values.len() != expected {
            return Err(PipelineError::data(
                "table",
                format!(
                    "column '{}' has {} rows, table has {}",
                    name,
                    values.len(),
                    expected
                ),
            ));
        }

        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Replace the values of an existing column, keeping its position
    pub fn replace_values(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        let expected = self.row_count();
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| PipelineError::data("table", format!("no column '{}'", name)))?;
        if values.len() != expected {
            return Err(PipelineError::data(
                "table",
                format!(
                    "column '{}' has {} rows, table has {}",
                    name,
                    values.len(),
                    expected
                ),
            ));
        }
        column.values = values;
        Ok(())
    }

    /// Parse CSV text
    ///
    /// # Arguments
    /// * `source_name` - Used in error messages (file path or trial id)
    /// * `text` - CSV content with a header row
    /// * `index_column` - Column to keep as string row labels instead of numbers
    pub fn parse(source_name: &str, text: &str, index_column: Option<&str>) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header_line)) = lines.next() else {
            return Err(PipelineError::data(source_name, "file is empty"));
        };
        let header = split_record(header_line.trim_start_matches('\u{feff}'));

        let index_pos = match index_column {
            Some(name) => Some(header.iter().position(|h| h == name).ok_or_else(|| {
                PipelineError::data(source_name, format!("missing index column '{}'", name))
            })?),
            None => None,
        };

        let mut labels = Vec::new();
        let mut data: Vec<Vec<f64>> = vec![Vec::new(); header.len()];

        for (line_num, line) in lines {
            let fields = split_record(line);
            if fields.len() != header.len() {
                return Err(PipelineError::data(
                    source_name,
                    format!(
                        "line {}: expected {} fields, got {}",
                        line_num + 1,
                        header.len(),
                        fields.len()
                    ),
                ));
            }

            for (pos, field) in fields.iter().enumerate() {
                if Some(pos) == index_pos {
                    labels.push(field.clone());
                    continue;
                }
                let value = parse_cell(field).ok_or_else(|| {
                    PipelineError::data(
                        source_name,
                        format!(
                            "line {}: invalid value '{}' in column '{}'",
                            line_num + 1,
                            field,
                            header[pos]
                        ),
                    )
                })?;
                data[pos].push(value);
            }
        }

        let mut table = match (index_column, index_pos) {
            (Some(name), Some(_)) => Self::with_index(name, labels),
            _ => Self::new(),
        };

        for (pos, (name, values)) in header.into_iter().zip(data).enumerate() {
            if Some(pos) == index_pos {
                continue;
            }
            table
                .push_column(name, values)
                .map_err(|e| PipelineError::data(source_name, e.to_string()))?;
        }

        Ok(table)
    }

    /// Read a CSV file
    pub fn read_csv(path: &Path, index_column: Option<&str>) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::parse(&path.display().to_string(), &text, index_column)
    }

    /// Render as CSV
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        let mut header: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
        if let Some(index) = &self.index {
            header.push(escape_field(&index.name));
        }
        header.extend(self.columns.iter().map(|c| escape_field(&c.name)));
        output.push_str(&header.join(","));
        output.push('\n');

        for row in 0..self.row_count() {
            let mut fields: Vec<String> = Vec::with_capacity(header.len());
            if let Some(index) = &self.index {
                fields.push(escape_field(&index.labels[row]));
            }
            for column in &self.columns {
                fields.push(format_cell(column.values.get(row).copied()));
            }
            output.push_str(&fields.join(","));
            output.push('\n');
        }

        output
    }

    /// Write as CSV to `path`
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_csv()).map_err(|e| PipelineError::io(path, e))
    }
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV record, honouring double-quoted fields
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Empty cells are null; `inf`, `-inf` and `nan` parse as their float values
fn parse_cell(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Some(f64::NAN);
    }
    field.parse::<f64>().ok()
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_nan() => String::new(),
        Some(v) if v == f64::INFINITY => "inf".to_string(),
        Some(v) if v == f64::NEG_INFINITY => "-inf".to_string(),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
