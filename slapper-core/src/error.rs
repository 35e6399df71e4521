/*!
Error types for the slapper core engine.
*/

use thiserror::Error;

/// Result type used throughout the slapper core.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors that can occur while gathering or persisting a snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Compression algorithm name is not one of `zlib` or `gzip`
    #[error("Unsupported compression algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Storage type tag is not one of `sqlite` or `postgres`
    #[error("Unsupported database type: {0}")]
    UnsupportedBackend(String),

    /// A child record was handed to the store before its owning system id was assigned
    #[error("system_id not set on {record}")]
    MissingOwner { record: &'static str },

    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the embedded SQLite store
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Errors raised by the PostgreSQL client
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Compression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Storage lifecycle errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// The host platform could not report a required fact
    #[error("Platform error: {0}")]
    Platform(String),

    /// Configuration file or override errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl SnapshotError {
    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new platform error
    pub fn platform<S: Into<String>>(msg: S) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
}
