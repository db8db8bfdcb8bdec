//! Whitespace-delimited run tables
//!
//! One row per episode, one column per recorded quantity. Columns are
//! addressed 1-based, the way they are named on the command line.

use crate::error::CurveError;
use crate::types::Run;
use serde::{Deserialize, Serialize};

/// A data column, optionally divided by another column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub value: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator: Option<usize>,
}

impl ColumnSpec {
    pub fn new(value: usize) -> Self {
        Self {
            value,
            denominator: None,
        }
    }

    pub fn ratio(value: usize, denominator: usize) -> Self {
        Self {
            value,
            denominator: Some(denominator),
        }
    }

    /// Default axis label, e.g. `Col 2 / Col 4`
    pub fn label(&self) -> String {
        match self.denominator {
            Some(d) => format!("Col {} / Col {}", self.value, d),
            None => format!("Col {}", self.value),
        }
    }
}

/// How to read a run table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSpec {
    pub columns: Vec<ColumnSpec>,
    /// Column holding per-row step counts, summed into cumulative positions
    pub step_column: Option<usize>,
    /// Rows skipped after every row that is read
    pub skip_rows: usize,
    /// Discard the first non-blank line
    pub has_header: bool,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self {
            columns: vec![ColumnSpec::new(1)],
            step_column: None,
            skip_rows: 0,
            has_header: false,
        }
    }
}

impl TableSpec {
    /// Reject column numbers that cannot address a cell
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.columns.is_empty() {
            return Err(CurveError::InvalidConfig(
                "at least one data column is required".to_string(),
            ));
        }
        let referenced = self
            .columns
            .iter()
            .flat_map(|c| std::iter::once(c.value).chain(c.denominator))
            .chain(self.step_column);
        for column in referenced {
            if column == 0 {
                return Err(CurveError::InvalidConfig(
                    "columns are numbered from 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// The samples read from one table, one series per configured column
#[derive(Debug, Clone, PartialEq)]
pub struct RunTable {
    series: Vec<Vec<f64>>,
    /// Cumulative step totals aligned with `series`, when a step column is set
    positions: Option<Vec<Vec<f64>>>,
    rows: usize,
    total_steps: Option<f64>,
}

impl RunTable {
    /// Parse table text according to `spec`.
    ///
    /// A zero denominator yields a score of 0. Rows too short to hold a data
    /// column add nothing to that column; a missing denominator or step cell
    /// is an error.
    pub fn parse(text: &str, spec: &TableSpec) -> Result<Self, CurveError> {
        spec.validate()?;

        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        if spec.has_header {
            lines.next();
        }

        let mut series = vec![Vec::new(); spec.columns.len()];
        let mut positions = spec
            .step_column
            .map(|_| vec![Vec::new(); spec.columns.len()]);
        let mut total = 0.0;
        let mut rows = 0;
        let mut skip = 0;

        for (index, line) in lines {
            let line_no = index + 1;
            let cells: Vec<&str> = line.split_whitespace().collect();

            // skipped rows still count towards the step total
            if let Some(step_column) = spec.step_column {
                total += required_cell(&cells, step_column, line_no)?;
            }
            if skip > 0 {
                skip -= 1;
                continue;
            }
            skip = spec.skip_rows;
            rows += 1;

            for (c, column) in spec.columns.iter().enumerate() {
                let Some(raw) = cells.get(column.value - 1) else {
                    continue;
                };
                let mut score = parse_cell(raw, column.value, line_no)?;
                if let Some(denominator) = column.denominator {
                    let denom = required_cell(&cells, denominator, line_no)?;
                    score = if denom == 0.0 { 0.0 } else { score / denom };
                }
                series[c].push(score);
                if let Some(positions) = positions.as_mut() {
                    positions[c].push(total);
                }
            }
        }

        Ok(Self {
            series,
            positions,
            rows,
            total_steps: spec.step_column.map(|_| total),
        })
    }

    /// Number of rows read (skipped rows excluded)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Sum of the step column over every row, skipped rows included
    pub fn total_steps(&self) -> Option<f64> {
        self.total_steps
    }

    /// Samples of the `column`-th configured column
    pub fn samples(&self, column: usize) -> Option<&[f64]> {
        self.series.get(column).map(Vec::as_slice)
    }

    /// Build a run from the `column`-th configured column
    pub fn run(&self, column: usize, label: impl Into<String>) -> Option<Run> {
        let values = self.series.get(column)?.clone();
        Some(match &self.positions {
            Some(positions) => Run::with_positions(label, values, positions[column].clone()),
            None => Run::new(label, values),
        })
    }
}

fn parse_cell(raw: &str, column: usize, line_no: usize) -> Result<f64, CurveError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(CurveError::ParseError(format!(
            "line {line_no}, column {column}: '{raw}' is not a finite number"
        ))),
        Err(_) => Err(CurveError::ParseError(format!(
            "line {line_no}, column {column}: '{raw}' is not a number"
        ))),
    }
}

fn required_cell(cells: &[&str], column: usize, line_no: usize) -> Result<f64, CurveError> {
    match cells.get(column - 1) {
        Some(raw) => parse_cell(raw, column, line_no),
        None => Err(CurveError::ParseError(format!(
            "line {line_no}: missing column {column}"
        ))),
    }
}
