use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use lrfmp_core::{LedgerConfig, LrfmpError, TransactionEvent};

/// One raw ledger row. Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct LedgerRecord {
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    transaction_date: Option<String>,
    #[serde(default)]
    order_status: Option<String>,
    #[serde(default)]
    product_line: Option<String>,
    #[serde(default)]
    list_price: Option<String>,
}

/// Row counts gathered while importing a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub rows_read: u64,
    pub approved: u64,
    pub skipped_status: u64,
}

pub struct LedgerImporter;

impl LedgerImporter {
    /// Import a CSV ledger from disk.
    pub fn import(
        path: &Path,
        config: &LedgerConfig,
    ) -> Result<(Vec<TransactionEvent>, LedgerStats), LrfmpError> {
        let file = std::fs::File::open(path).map_err(LrfmpError::Io)?;
        let (events, stats) = Self::from_reader(file, config)?;
        info!(
            "Imported {} events ({} rows, {} skipped by status) from {}",
            events.len(),
            stats.rows_read,
            stats.skipped_status,
            path.display()
        );
        Ok((events, stats))
    }

    /// Import a CSV ledger from any reader. The first row must be a header.
    ///
    /// Rows whose `order_status` is not the configured approved sentinel are
    /// skipped. Approved rows must carry a customer, a parseable date, and a
    /// non-negative price, otherwise the whole import fails.
    pub fn from_reader<R: Read>(
        reader: R,
        config: &LedgerConfig,
    ) -> Result<(Vec<TransactionEvent>, LedgerStats), LrfmpError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| LrfmpError::Csv(format!("failed to read headers: {e}")))?
            .clone();

        for required in ["customer_id", "transaction_date", "order_status", "list_price"] {
            if !headers.iter().any(|h| h == required) {
                return Err(LrfmpError::Csv(format!(
                    "missing column '{required}' (available: {:?})",
                    headers.iter().collect::<Vec<_>>()
                )));
            }
        }

        let approved = config.approved_status.trim().to_lowercase();
        let mut events = Vec::new();
        let mut stats = LedgerStats::default();

        for result in reader.records() {
            let record = result.map_err(|e| LrfmpError::Csv(e.to_string()))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            stats.rows_read += 1;

            let row: LedgerRecord = record
                .deserialize(Some(&headers))
                .map_err(|e| LrfmpError::invalid_at(line, e.to_string()))?;

            let status = row.order_status.as_deref().unwrap_or("").trim().to_lowercase();
            if status != approved {
                stats.skipped_status += 1;
                continue;
            }

            let customer_id = match non_empty(row.customer_id.as_deref()) {
                Some(id) => id.to_string(),
                None => {
                    return Err(LrfmpError::invalid_at(line, "missing customer_id"));
                }
            };

            let raw_date = non_empty(row.transaction_date.as_deref())
                .ok_or_else(|| LrfmpError::invalid_at(line, "missing transaction_date"))?;
            let event_date = NaiveDate::parse_from_str(raw_date, &config.date_format).map_err(|e| {
                LrfmpError::invalid_at(
                    line,
                    format!("cannot parse date '{raw_date}' with '{}': {e}", config.date_format),
                )
            })?;

            let amount = parse_price(row.list_price.as_deref(), line)?;

            debug!(
                line,
                transaction_id = row.transaction_id.as_deref().unwrap_or(""),
                customer = %customer_id,
                "approved row"
            );

            events.push(TransactionEvent::new(
                customer_id,
                event_date,
                amount,
                row.product_line.as_deref(),
            ));
            stats.approved += 1;
        }

        Ok((events, stats))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a list price such as `1,234.50` or `$71.49`.
fn parse_price(raw: Option<&str>, line: u64) -> Result<f64, LrfmpError> {
    let raw = non_empty(raw).ok_or_else(|| LrfmpError::invalid_at(line, "missing list_price"))?;
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '$').collect();
    let price: f64 = cleaned
        .parse()
        .map_err(|_| LrfmpError::invalid_at(line, format!("cannot parse list_price '{raw}'")))?;
    if !price.is_finite() || price < 0.0 {
        return Err(LrfmpError::invalid_at(
            line,
            format!("list_price must be a non-negative number (got {raw})"),
        ));
    }
    Ok(price)
}
