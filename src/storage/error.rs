use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache blob encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
