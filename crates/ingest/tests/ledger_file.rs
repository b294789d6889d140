/// Integration tests for importing a ledger file from disk.

use std::path::PathBuf;

use chrono::NaiveDate;
use uuid::Uuid;

use lrfmp_core::{LedgerConfig, LrfmpError};
use lrfmp_ingest::LedgerImporter;

/// Write a ledger into a unique temp file.
fn write_ledger(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("lrfmp-ledger-{}.csv", Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn imports_ledger_from_disk() {
    let path = write_ledger(
        "transaction_id,customer_id,transaction_date,order_status,product_line,list_price\n\
         1,A,01/01/2017,Approved,Road,100\n\
         2,A,31/01/2017,Approved,Road,100\n\
         3,A,02/03/2017,Approved,Touring,100\n\
         4,B,01/01/2017,Approved,,50\n\
         5,B,05/01/2017,Cancelled,Road,999\n",
    );

    let (events, stats) = LedgerImporter::import(&path, &LedgerConfig::default()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(stats.rows_read, 5);
    assert_eq!(stats.approved, 4);
    assert_eq!(stats.skipped_status, 1);

    let b: Vec<_> = events.iter().filter(|e| e.customer_id == "B").collect();
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].category, "Other");
    assert_eq!(b[0].event_date, NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
}

#[test]
fn missing_file_is_io_error() {
    let path = std::env::temp_dir().join(format!("lrfmp-missing-{}.csv", Uuid::new_v4()));
    let err = LedgerImporter::import(&path, &LedgerConfig::default()).unwrap_err();
    assert!(matches!(err, LrfmpError::Io(_)));
}
