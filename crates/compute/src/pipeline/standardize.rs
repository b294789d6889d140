use serde::Serialize;

use lrfmp_core::LrfmpError;

use super::matrix::FeatureMatrix;

/// Relative tolerance below which a column's spread counts as zero.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// Mean and population standard deviation of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    pub std_dev: f64,
}

/// Fitted per-column z-score parameters.
///
/// Returned by value from [`Scaler::fit`] and passed explicitly to every
/// place that maps centroids back to original units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scaler {
    scales: Vec<ColumnScale>,
}

impl Scaler {
    /// Fit on every column of `matrix`.
    ///
    /// Fails with `EmptyInput` for an empty matrix and `DegenerateColumn`
    /// for any column without variance.
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self, LrfmpError> {
        if matrix.nrows() == 0 {
            return Err(LrfmpError::EmptyInput("no rows to standardize".to_string()));
        }
        matrix.validate()?;

        let n = matrix.nrows() as f64;
        let mut scales = Vec::with_capacity(matrix.ncols());

        for (j, name) in matrix.columns().iter().enumerate() {
            let values = matrix.column(j);
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();

            if !std_dev.is_finite() || std_dev <= DEGENERATE_TOLERANCE * mean.abs().max(1.0) {
                return Err(LrfmpError::DegenerateColumn {
                    column: name.clone(),
                });
            }

            scales.push(ColumnScale {
                column: name.clone(),
                mean,
                std_dev,
            });
        }

        Ok(Self { scales })
    }

    /// Fit on `matrix` and return it standardized alongside the scaler.
    pub fn fit_transform(matrix: &FeatureMatrix) -> Result<(FeatureMatrix, Self), LrfmpError> {
        let scaler = Self::fit(matrix)?;
        let standardized = scaler.transform(matrix)?;
        Ok((standardized, scaler))
    }

    pub fn scales(&self) -> &[ColumnScale] {
        &self.scales
    }

    /// `z = (x - mean) / std_dev` per column.
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix, LrfmpError> {
        self.check_width(matrix.ncols())?;
        let rows = matrix
            .points()
            .iter()
            .map(|(_, row)| self.transform_row(row))
            .collect();
        Ok(matrix.with_rows(rows))
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.scales)
            .map(|(x, s)| (x - s.mean) / s.std_dev)
            .collect()
    }

    /// Map a standardized row back to original units.
    pub fn inverse_transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.scales)
            .map(|(z, s)| z * s.std_dev + s.mean)
            .collect()
    }

    /// Denormalize cluster centroids into original feature units.
    pub fn denormalize(&self, centroids: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, LrfmpError> {
        centroids
            .iter()
            .map(|c| {
                self.check_width(c.len())?;
                Ok(self.inverse_transform_row(c))
            })
            .collect()
    }

    fn check_width(&self, width: usize) -> Result<(), LrfmpError> {
        if width != self.scales.len() {
            return Err(LrfmpError::invalid(format!(
                "expected {} columns, got {width}",
                self.scales.len()
            )));
        }
        Ok(())
    }
}
