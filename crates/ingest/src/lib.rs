//! Transaction ledger loading: reads the raw CSV ledger, keeps approved
//! rows, and hands clean `TransactionEvent`s to the compute crate.

pub mod ledger;

pub use ledger::{LedgerImporter, LedgerStats};
