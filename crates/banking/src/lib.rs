pub mod config;
pub mod duplicate;
pub mod error;
pub mod ingest;
pub mod matching;
pub mod reconciliation;
pub mod service;

pub use config::{BankingConfig, ImportSettings};
pub use duplicate::is_duplicate;
pub use error::BankingError;
pub use ingest::{ImportRequest, PreviewRow, PreviewStatus};
pub use service::BankingService;

pub use ledgerlink_storage::{AmountRange, StorageOptions, TransactionFilter};
pub use tokio_util::sync::CancellationToken;
