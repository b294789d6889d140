use serde::Serialize;

use lrfmp_core::{CustomerId, LrfmpError};

/// Base feature columns, in order.
pub const LRFMP_COLUMNS: [&str; 5] = ["length", "recency", "frequency", "monetary", "periodicity"];

/// Named columns over `(customer_id, row)` points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    points: Vec<(CustomerId, Vec<f64>)>,
}

impl FeatureMatrix {
    /// Callers are expected to pass rows with one value per column; use
    /// [`FeatureMatrix::validate`] when the rows come from outside the crate.
    pub fn new(columns: Vec<String>, points: Vec<(CustomerId, Vec<f64>)>) -> Self {
        Self { columns, points }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn points(&self) -> &[(CustomerId, Vec<f64>)] {
        &self.points
    }

    pub fn nrows(&self) -> usize {
        self.points.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Values of column `j` across all rows.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.points.iter().map(|(_, row)| row[j]).collect()
    }

    /// Check that every row is as wide as the header and finite.
    pub fn validate(&self) -> Result<(), LrfmpError> {
        for (id, row) in &self.points {
            if row.len() != self.columns.len() {
                return Err(LrfmpError::invalid(format!(
                    "row {id} has {} values, expected {}",
                    row.len(),
                    self.columns.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(LrfmpError::invalid(format!("row {id} has a non-finite value")));
            }
        }
        Ok(())
    }

    /// Append columns. `values[i]` holds the new values for row `i`.
    pub fn append_columns(
        &mut self,
        names: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<(), LrfmpError> {
        if values.len() != self.points.len() {
            return Err(LrfmpError::invalid(format!(
                "{} appended rows for {} points",
                values.len(),
                self.points.len()
            )));
        }
        if let Some(bad) = values.iter().position(|v| v.len() != names.len()) {
            return Err(LrfmpError::invalid(format!(
                "appended row {bad} has {} values, expected {}",
                values[bad].len(),
                names.len()
            )));
        }

        self.columns.extend(names);
        for ((_, row), extra) in self.points.iter_mut().zip(values) {
            row.extend(extra);
        }
        Ok(())
    }

    /// Replace the row values while keeping ids and columns.
    pub(crate) fn with_rows(&self, rows: Vec<Vec<f64>>) -> Self {
        let points = self
            .points
            .iter()
            .zip(rows)
            .map(|((id, _), row)| (id.clone(), row))
            .collect();
        Self {
            columns: self.columns.clone(),
            points,
        }
    }
}
