use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use lrfmp_core::{CustomerId, LrfmpError, TransactionEvent};

use super::matrix::{FeatureMatrix, LRFMP_COLUMNS};

/// LRFMP feature vector for one customer:
/// [length, recency, frequency, monetary, periodicity]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerFeatureVector {
    pub customer_id: CustomerId,
    /// Days between first and last visit.
    pub length: i64,
    /// Days between the last visit and the observation end.
    pub recency: i64,
    /// Distinct visit dates.
    pub frequency: u32,
    /// Average spend per visit.
    pub monetary: f64,
    /// Median inter-visit gap in days; `None` for single-visit customers.
    pub periodicity: Option<f64>,
}

impl CustomerFeatureVector {
    /// The five LRFMP values in column order, or `None` without periodicity.
    pub fn values(&self) -> Option<[f64; 5]> {
        let periodicity = self.periodicity?;
        Some([
            self.length as f64,
            self.recency as f64,
            f64::from(self.frequency),
            self.monetary,
            periodicity,
        ])
    }
}

/// Visits and spend accumulated from events for a single customer.
struct VisitAccumulator {
    /// Spend per distinct visit date, ordered by date.
    visits: BTreeMap<NaiveDate, f64>,
    category_spend: BTreeMap<String, f64>,
}

impl VisitAccumulator {
    fn new() -> Self {
        Self {
            visits: BTreeMap::new(),
            category_spend: BTreeMap::new(),
        }
    }
}

/// Groups transaction events by customer before deriving features.
pub struct FeatureBuilder {
    customers: HashMap<CustomerId, VisitAccumulator>,
    events_seen: usize,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self {
            customers: HashMap::new(),
            events_seen: 0,
        }
    }

    /// Fold a single event into its customer's accumulator.
    ///
    /// Same-day events merge into one visit; their amounts still add up.
    pub fn update(&mut self, event: &TransactionEvent) -> Result<(), LrfmpError> {
        if event.customer_id.trim().is_empty() {
            return Err(LrfmpError::invalid("event without customer_id"));
        }
        if !event.amount.is_finite() || event.amount < 0.0 {
            return Err(LrfmpError::invalid(format!(
                "customer {}: amount must be a non-negative number (got {})",
                event.customer_id, event.amount
            )));
        }

        let acc = self
            .customers
            .entry(event.customer_id.clone())
            .or_insert_with(VisitAccumulator::new);

        *acc.visits.entry(event.event_date).or_insert(0.0) += event.amount;
        *acc.category_spend.entry(event.category.clone()).or_insert(0.0) += event.amount;
        self.events_seen += 1;
        Ok(())
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    /// Derive one feature vector per customer seen so far.
    pub fn build(self) -> Result<FeatureTable, LrfmpError> {
        let observation_end = self
            .customers
            .values()
            .filter_map(|acc| acc.visits.keys().next_back().copied())
            .max()
            .ok_or_else(|| LrfmpError::EmptyInput("no transaction events".to_string()))?;

        let mut customers = Vec::with_capacity(self.customers.len());
        let mut category_spend = BTreeMap::new();

        for (customer_id, acc) in self.customers {
            customers.push(derive_features(&customer_id, &acc.visits, observation_end));
            category_spend.insert(customer_id, acc.category_spend);
        }
        customers.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

        Ok(FeatureTable {
            observation_end,
            customers,
            category_spend,
        })
    }
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build LRFMP features for a full batch of events.
pub fn build_features(events: &[TransactionEvent]) -> Result<FeatureTable, LrfmpError> {
    let mut builder = FeatureBuilder::new();
    for event in events {
        builder.update(event)?;
    }
    builder.build()
}

fn derive_features(
    customer_id: &str,
    visits: &BTreeMap<NaiveDate, f64>,
    observation_end: NaiveDate,
) -> CustomerFeatureVector {
    let dates: Vec<NaiveDate> = visits.keys().copied().collect();
    // Accumulators are only created on insert, so there is at least one visit.
    let first = dates[0];
    let last = dates[dates.len() - 1];
    let frequency = dates.len() as u32;
    let total_spend: f64 = visits.values().sum();

    let gaps: Vec<i64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days()).collect();

    CustomerFeatureVector {
        customer_id: customer_id.to_string(),
        length: (last - first).num_days(),
        recency: (observation_end - last).num_days(),
        frequency,
        monetary: total_spend / f64::from(frequency),
        periodicity: median(gaps),
    }
}

/// Median of day gaps; the mean of the two middle values for even counts.
fn median(mut gaps: Vec<i64>) -> Option<f64> {
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_unstable();
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 1 {
        Some(gaps[mid] as f64)
    } else {
        Some((gaps[mid - 1] + gaps[mid]) as f64 / 2.0)
    }
}

/// Feature vectors for every customer in the batch.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Latest visit date across all customers.
    pub observation_end: NaiveDate,
    /// Sorted by customer id.
    pub customers: Vec<CustomerFeatureVector>,
    category_spend: BTreeMap<CustomerId, BTreeMap<String, f64>>,
}

impl FeatureTable {
    /// Customers with at least two visits, i.e. a defined periodicity.
    pub fn eligible(&self) -> EligibleCustomerSet {
        EligibleCustomerSet {
            customers: self
                .customers
                .iter()
                .filter(|c| c.periodicity.is_some())
                .cloned()
                .collect(),
        }
    }

    pub fn single_visit_count(&self) -> usize {
        self.customers.iter().filter(|c| c.periodicity.is_none()).count()
    }

    pub fn get(&self, customer_id: &str) -> Option<&CustomerFeatureVector> {
        self.customers
            .binary_search_by(|c| c.customer_id.as_str().cmp(customer_id))
            .ok()
            .map(|i| &self.customers[i])
    }

    /// Total spend per category for one customer.
    pub fn category_spend(&self, customer_id: &str) -> Option<&BTreeMap<String, f64>> {
        self.category_spend.get(customer_id)
    }

    /// All categories seen in the batch, sorted by name.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.category_spend
            .values()
            .flat_map(|spend| spend.keys().map(String::as_str))
            .collect()
    }
}

/// Customers that take part in clustering (frequency >= 2).
#[derive(Debug, Clone)]
pub struct EligibleCustomerSet {
    customers: Vec<CustomerFeatureVector>,
}

impl EligibleCustomerSet {
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn customers(&self) -> &[CustomerFeatureVector] {
        &self.customers
    }

    /// Matrix with the five LRFMP columns, row-aligned with this set.
    pub fn to_matrix(&self) -> FeatureMatrix {
        let points = self
            .customers
            .iter()
            .filter_map(|c| c.values().map(|v| (c.customer_id.clone(), v.to_vec())))
            .collect();
        FeatureMatrix::new(LRFMP_COLUMNS.iter().map(|c| c.to_string()).collect(), points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 1, 1).unwrap() + chrono::Duration::days(n - 1)
    }

    fn event(customer: &str, d: i64, amount: f64) -> TransactionEvent {
        TransactionEvent::new(customer, day(d), amount, Some("Standard"))
    }

    #[test]
    fn end_to_end_example() {
        let events = vec![
            event("A", 1, 100.0),
            event("A", 31, 100.0),
            event("A", 61, 100.0),
            event("B", 1, 50.0),
        ];
        let table = build_features(&events).unwrap();

        assert_eq!(table.observation_end, day(61));

        let a = table.get("A").unwrap();
        assert_eq!(a.length, 60);
        assert_eq!(a.recency, 0);
        assert_eq!(a.frequency, 3);
        assert!((a.monetary - 100.0).abs() < 1e-9);
        assert_eq!(a.periodicity, Some(30.0));

        let b = table.get("B").unwrap();
        assert_eq!(b.length, 0);
        assert_eq!(b.recency, 60);
        assert_eq!(b.periodicity, None);

        let eligible = table.eligible();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible.customers()[0].customer_id, "A");
        assert_eq!(table.single_visit_count(), 1);
    }

    #[test]
    fn same_day_events_are_one_visit_but_all_spend() {
        let events = vec![
            event("A", 1, 10.0),
            event("A", 1, 30.0),
            event("A", 5, 20.0),
            event("A", 5, 20.0),
        ];
        let table = build_features(&events).unwrap();
        let a = table.get("A").unwrap();

        assert_eq!(a.frequency, 2);
        assert!((a.monetary - 40.0).abs() < 1e-9);
        assert_eq!(a.periodicity, Some(4.0));
    }

    #[test]
    fn single_visit_has_zero_length_and_no_periodicity() {
        let events = vec![event("S", 3, 5.0), event("S", 3, 7.0), event("X", 10, 1.0)];
        let table = build_features(&events).unwrap();
        let s = table.get("S").unwrap();

        assert_eq!(s.frequency, 1);
        assert_eq!(s.length, 0);
        assert_eq!(s.periodicity, None);
        assert!(s.values().is_none());
    }

    #[test]
    fn two_visits_periodicity_is_the_single_gap() {
        let table = build_features(&[event("A", 1, 1.0), event("A", 8, 1.0)]).unwrap();
        assert_eq!(table.get("A").unwrap().periodicity, Some(7.0));
    }

    #[test]
    fn periodicity_is_median_not_mean() {
        // gaps: 1, 2, 30 -> median 2
        let events = vec![
            event("A", 1, 1.0),
            event("A", 2, 1.0),
            event("A", 4, 1.0),
            event("A", 34, 1.0),
        ];
        let table = build_features(&events).unwrap();
        assert_eq!(table.get("A").unwrap().periodicity, Some(2.0));

        // gaps: 2, 4, 6, 10 -> median (4 + 6) / 2
        let events = vec![
            event("B", 1, 1.0),
            event("B", 3, 1.0),
            event("B", 7, 1.0),
            event("B", 13, 1.0),
            event("B", 23, 1.0),
        ];
        let table = build_features(&events).unwrap();
        assert_eq!(table.get("B").unwrap().periodicity, Some(5.0));
    }

    #[test]
    fn recency_uses_global_reference() {
        let events = vec![
            event("A", 1, 1.0),
            event("A", 20, 1.0),
            event("B", 5, 1.0),
            event("B", 20, 1.0),
            event("C", 50, 1.0),
        ];
        let table = build_features(&events).unwrap();
        assert_eq!(table.get("A").unwrap().recency, 30);
        assert_eq!(table.get("B").unwrap().recency, 30);
        assert_eq!(table.get("C").unwrap().recency, 0);
    }

    #[test]
    fn negative_amount_is_invalid_input() {
        let mut builder = FeatureBuilder::new();
        let err = builder.update(&event("A", 1, -1.0)).unwrap_err();
        assert!(matches!(err, LrfmpError::InvalidInput { .. }));

        let err = builder.update(&event("A", 1, f64::NAN)).unwrap_err();
        assert!(matches!(err, LrfmpError::InvalidInput { .. }));
    }

    #[test]
    fn blank_customer_is_invalid_input() {
        let err = build_features(&[event(" ", 1, 1.0)]).unwrap_err();
        assert!(matches!(err, LrfmpError::InvalidInput { .. }));
    }

    #[test]
    fn no_events_is_empty_input() {
        let err = build_features(&[]).unwrap_err();
        assert!(matches!(err, LrfmpError::EmptyInput(_)));
    }

    #[test]
    fn category_spend_is_tracked_per_customer() {
        let events = vec![
            TransactionEvent::new("A", day(1), 10.0, Some("Road")),
            TransactionEvent::new("A", day(2), 5.0, Some("Road")),
            TransactionEvent::new("A", day(2), 7.0, None),
        ];
        let table = build_features(&events).unwrap();
        let spend = table.category_spend("A").unwrap();
        assert_eq!(spend["Road"], 15.0);
        assert_eq!(spend["Other"], 7.0);
        assert_eq!(table.categories().into_iter().collect::<Vec<_>>(), vec!["Other", "Road"]);
    }

    #[test]
    fn eligible_matrix_has_lrfmp_columns() {
        let events = vec![event("A", 1, 100.0), event("A", 31, 100.0), event("B", 1, 50.0)];
        let matrix = build_features(&events).unwrap().eligible().to_matrix();
        assert_eq!(matrix.columns().to_vec(), LRFMP_COLUMNS.map(String::from).to_vec());
        assert_eq!(matrix.nrows(), 1);
        assert_eq!(matrix.points()[0].1, vec![30.0, 0.0, 2.0, 100.0, 30.0]);
    }
}
