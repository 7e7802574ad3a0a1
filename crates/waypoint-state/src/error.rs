//! Error types for the Waypoint shard store.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for shard store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during shard store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: Uuid },

    #[error("{entity} {id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict {
        entity: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("position {requested} is out of range 1..={max}")]
    PositionOutOfRange { requested: u32, max: u32 },
}

impl StateError {
    /// Whether the error comes from the storage engine itself rather than
    /// from the data it holds. These are the failures a different pool
    /// behind the same shard key might not have.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            StateError::Open(_)
                | StateError::Transaction(_)
                | StateError::Table(_)
                | StateError::Read(_)
                | StateError::Write(_)
        )
    }
}
