//! Product-preference columns: per-category spend appended to the LRFMP
//! matrix so the same standardize/sweep/partition path clusters on them.

use tracing::warn;

use lrfmp_core::LrfmpError;

use super::features::FeatureTable;
use super::matrix::FeatureMatrix;

/// Prefix for generated category column names.
pub const CATEGORY_PREFIX: &str = "spend_";

/// Append one `spend_<category>` column per category to `matrix`.
///
/// Rows missing a category get 0. Categories whose spend is the same for
/// every row are skipped, since a constant column cannot be standardized.
/// Returns the names of the appended columns.
pub fn append_category_spend(
    matrix: &mut FeatureMatrix,
    table: &FeatureTable,
) -> Result<Vec<String>, LrfmpError> {
    let categories: Vec<String> = table.categories().into_iter().map(str::to_string).collect();

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(matrix.nrows());
    for (customer_id, _) in matrix.points() {
        let spend = table.category_spend(customer_id).ok_or_else(|| {
            LrfmpError::invalid(format!("customer {customer_id} is not in the feature table"))
        })?;
        rows.push(
            categories
                .iter()
                .map(|c| spend.get(c).copied().unwrap_or(0.0))
                .collect(),
        );
    }

    let keep: Vec<usize> = (0..categories.len())
        .filter(|&j| {
            let first = rows.first().map(|r| r[j]);
            let constant = rows.iter().all(|r| Some(r[j]) == first);
            if constant {
                warn!(category = %categories[j], "dropping constant category column");
            }
            !constant
        })
        .collect();

    let names: Vec<String> = keep
        .iter()
        .map(|&j| format!("{CATEGORY_PREFIX}{}", categories[j]))
        .collect();
    let values: Vec<Vec<f64>> = rows
        .into_iter()
        .map(|r| keep.iter().map(|&j| r[j]).collect())
        .collect();

    matrix.append_columns(names.clone(), values)?;
    Ok(names)
}
