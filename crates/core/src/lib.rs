pub mod config;
pub mod error;
pub mod transaction;

pub use config::{ClusteringConfig, Config, LedgerConfig};
pub use error::*;
pub use transaction::*;
