use thiserror::Error;

/// Errors that can arise while loading world data or talking to the character store.
///
/// Trade protocol problems are deliberately absent: a misbehaving client ends its
/// session instead of producing an error for the caller.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, lock files, seed files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Another process already holds the data directory.
    #[error("data directory locked: {0}")]
    DataDirLocked(String),

    /// Item seed file could not be parsed or contained invalid classes.
    #[error("invalid item seed: {0}")]
    Seed(String),

    /// Configuration values outside their allowed range.
    #[error("invalid configuration: {0}")]
    Config(String),
}
