//! Tabular dataset loading
//!
//! Datasets are semicolon-separated text files: row 0 is a header of
//! column names, column 0 is a sample identifier, the next `nb_in_vars`
//! columns are inputs and the remaining `nb_out_vars` columns are
//! outputs. Cells that fail to parse as decimal floats are treated as
//! missing values.

use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Universe of discourse of one variable: the observed `[min, max]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub min: f64,
    pub max: f64,
}

impl Universe {
    /// Width of the universe
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Read-only table shared by both evolution engines
///
/// Rows are stored as parsed cells; `None` marks a missing value. The
/// per-variable universes are computed once at load time and never
/// change afterwards.
#[derive(Clone, Debug)]
pub struct Dataset {
    var_names: Vec<String>,
    samples: Vec<Vec<Option<f64>>>,
    universes: Vec<Universe>,
    nb_in_vars: usize,
    nb_out_vars: usize,
}

impl Dataset {
    /// Load a dataset from a `;`-separated file
    ///
    /// `nb_out_vars` declares how many trailing data columns are outputs;
    /// everything between the sample-id column and those is an input.
    pub fn from_path(path: impl AsRef<Path>, nb_out_vars: usize) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_path(path.as_ref())?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Self::from_rows(rows, nb_out_vars)
    }

    /// Build a dataset from pre-split rows (header first)
    pub fn from_rows(rows: Vec<Vec<String>>, nb_out_vars: usize) -> Result<Self, DatasetError> {
        let mut rows = rows.into_iter();
        let header = rows
            .next()
            .ok_or_else(|| DatasetError::Empty("no header row".to_string()))?;
        if header.len() < 2 {
            return Err(DatasetError::Empty("header has no data columns".to_string()));
        }

        // Column 0 is the sample id; the rest are variables.
        let var_names: Vec<String> = header[1..].to_vec();
        let nb_vars = var_names.len();
        if nb_vars <= nb_out_vars {
            return Err(DatasetError::TooFewColumns {
                columns: nb_vars,
                outputs: nb_out_vars,
            });
        }
        let nb_in_vars = nb_vars - nb_out_vars;

        let mut samples: Vec<Vec<Option<f64>>> = Vec::new();
        for (row_idx, row) in rows.enumerate() {
            // Trailing blank line from a final newline
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            if row.len() < header.len() {
                return Err(DatasetError::RaggedRow {
                    row: row_idx + 1,
                    expected: header.len(),
                    actual: row.len(),
                });
            }
            let cells: Vec<Option<f64>> = row[1..=nb_vars]
                .iter()
                .map(|cell| cell.trim().parse::<f64>().ok())
                .collect();
            samples.push(cells);
        }
        if samples.is_empty() {
            return Err(DatasetError::Empty("no sample rows".to_string()));
        }

        let universes = detect_universes(&samples, nb_vars);

        Ok(Self {
            var_names,
            samples,
            universes,
            nb_in_vars,
            nb_out_vars,
        })
    }

    /// Number of samples
    pub fn nb_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of input variables
    pub fn nb_in_vars(&self) -> usize {
        self.nb_in_vars
    }

    /// Number of output variables
    pub fn nb_out_vars(&self) -> usize {
        self.nb_out_vars
    }

    /// Name of variable `var` (inputs first, then outputs)
    pub fn var_name(&self, var: usize) -> &str {
        &self.var_names[var]
    }

    /// All variable names, inputs first
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Universe of variable `var` (inputs first, then outputs)
    pub fn universe(&self, var: usize) -> Universe {
        self.universes[var]
    }

    /// Input cell; `None` when the value is missing
    pub fn input(&self, sample: usize, var: usize) -> Option<f64> {
        self.samples[sample][var]
    }

    /// Output cell; missing outputs read as 0.0
    pub fn output(&self, sample: usize, var: usize) -> f64 {
        self.samples[sample][self.nb_in_vars + var].unwrap_or(0.0)
    }
}

fn detect_universes(samples: &[Vec<Option<f64>>], nb_vars: usize) -> Vec<Universe> {
    (0..nb_vars)
        .map(|var| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for row in samples {
                if let Some(value) = row[var] {
                    min = min.min(value);
                    max = max.max(value);
                }
            }
            if min > max {
                // Every cell missing: collapse to a zero-width universe
                Universe { min: 0.0, max: 0.0 }
            } else {
                Universe { min, max }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(text: &str) -> Vec<Vec<String>> {
        text.lines()
            .map(|line| line.split(';').map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_load_basic() {
        let data = rows("id;temp;flow;label\n0;1.5;10;1\n1;2.5;30;0\n2;0.5;20;1");
        let ds = Dataset::from_rows(data, 1).unwrap();
        assert_eq!(ds.nb_samples(), 3);
        assert_eq!(ds.nb_in_vars(), 2);
        assert_eq!(ds.nb_out_vars(), 1);
        assert_eq!(ds.var_name(0), "temp");
        assert_eq!(ds.var_name(2), "label");
        assert_eq!(ds.input(1, 0), Some(2.5));
        assert_eq!(ds.output(1, 0), 0.0);
    }

    #[test]
    fn test_universe_detection() {
        let data = rows("id;x;y\n0;1.0;5.0\n1;3.0;2.0\n2;2.0;8.0");
        let ds = Dataset::from_rows(data, 1).unwrap();
        assert_eq!(ds.universe(0), Universe { min: 1.0, max: 3.0 });
        assert_eq!(ds.universe(1), Universe { min: 2.0, max: 8.0 });
        assert_eq!(ds.universe(0).span(), 2.0);
    }

    #[test]
    fn test_missing_values() {
        let data = rows("id;x;y\n0;?;1\n1;2.0;0");
        let ds = Dataset::from_rows(data, 1).unwrap();
        assert_eq!(ds.input(0, 0), None);
        assert_eq!(ds.input(1, 0), Some(2.0));
        // Universe skips the missing cell
        assert_eq!(ds.universe(0), Universe { min: 2.0, max: 2.0 });
    }

    #[test]
    fn test_missing_output_reads_zero() {
        let data = rows("id;x;y\n0;1.0;n/a\n1;2.0;1");
        let ds = Dataset::from_rows(data, 1).unwrap();
        assert_eq!(ds.output(0, 0), 0.0);
        assert_eq!(ds.output(1, 0), 1.0);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        assert!(matches!(
            Dataset::from_rows(vec![], 1),
            Err(DatasetError::Empty(_))
        ));
        let header_only = rows("id;x;y");
        assert!(matches!(
            Dataset::from_rows(header_only, 1),
            Err(DatasetError::Empty(_))
        ));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let data = rows("id;x;y\n0;1.0");
        assert!(matches!(
            Dataset::from_rows(data, 1),
            Err(DatasetError::RaggedRow { row: 1, .. })
        ));
    }

    #[test]
    fn test_too_few_columns_rejected() {
        let data = rows("id;y\n0;1.0");
        assert!(matches!(
            Dataset::from_rows(data, 1),
            Err(DatasetError::TooFewColumns { .. })
        ));
    }

    #[test]
    fn test_trailing_blank_line_ignored() {
        let data = rows("id;x;y\n0;1.0;1\n");
        let ds = Dataset::from_rows(data, 1).unwrap();
        assert_eq!(ds.nb_samples(), 1);
    }

    #[test]
    fn test_from_path() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id;x;label").unwrap();
        writeln!(file, "0;0.1;0").unwrap();
        writeln!(file, "1;0.9;1").unwrap();
        let ds = Dataset::from_path(file.path(), 1).unwrap();
        assert_eq!(ds.nb_samples(), 2);
        assert_eq!(ds.var_name(0), "x");
    }
}
