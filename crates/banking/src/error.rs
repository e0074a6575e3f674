use ledgerlink_core::StateError;
use ledgerlink_import::ParseError;
use ledgerlink_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankingError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Could not read statement: {0}")]
    Parse(#[from] ParseError),

    #[error("Unknown bank format: {0}")]
    UnknownFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    #[error("Cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<sqlx::Error> for BankingError {
    fn from(e: sqlx::Error) -> Self {
        BankingError::Storage(StorageError::Database(e))
    }
}

impl BankingError {
    /// Transition conflicts and missing records, as opposed to
    /// infrastructure failures.
    pub fn as_state(&self) -> Option<&StateError> {
        match self {
            BankingError::State(e) => Some(e),
            _ => None,
        }
    }
}
