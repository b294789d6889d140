use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Customer identifier as it appears in the ledger.
pub type CustomerId = String;

/// Category assigned when a ledger row carries no product line.
pub const OTHER_CATEGORY: &str = "Other";

/// One completed line item from the transaction ledger.
///
/// Several events may share a date for the same customer (a multi-item
/// basket). They count as a single visit for temporal features but each
/// amount is summed into monetary totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub customer_id: CustomerId,
    pub event_date: NaiveDate,
    pub amount: f64,
    pub category: String,
}

impl TransactionEvent {
    pub fn new(
        customer_id: impl Into<CustomerId>,
        event_date: NaiveDate,
        amount: f64,
        category: Option<&str>,
    ) -> Self {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(OTHER_CATEGORY)
            .to_string();
        Self {
            customer_id: customer_id.into(),
            event_date,
            amount,
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_category_maps_to_other() {
        let d = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        assert_eq!(TransactionEvent::new("1", d, 10.0, None).category, OTHER_CATEGORY);
        assert_eq!(TransactionEvent::new("1", d, 10.0, Some("  ")).category, OTHER_CATEGORY);
        assert_eq!(TransactionEvent::new("1", d, 10.0, Some("Road")).category, "Road");
    }
}
