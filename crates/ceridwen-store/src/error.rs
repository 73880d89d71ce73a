use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An update supplied a version that no longer matches the stored row.
    #[error("Stale write for run {id}: read version {read}, stored version has moved on")]
    Conflict { id: String, read: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
