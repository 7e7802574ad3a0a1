//! Scatter-gather error types.

use thiserror::Error;

use waypoint_core::{ShardKey, ValidationError};
use waypoint_shard::ShardError;
use waypoint_state::StateError;

/// Any of these fails the whole listing; partial pages are never returned.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid page request: {0}")]
    Invalid(#[from] ValidationError),

    #[error("shard {shard} unreachable: {source}")]
    Shard {
        shard: ShardKey,
        #[source]
        source: ShardError,
    },

    #[error("shard {shard} query failed: {source}")]
    State {
        shard: ShardKey,
        #[source]
        source: StateError,
    },

    #[error("shard {shard} did not answer within {timeout_ms}ms")]
    Timeout { shard: ShardKey, timeout_ms: u64 },

    #[error("shard task failed: {0}")]
    Task(String),
}

impl QueryError {
    /// The shard whose failure aborted the query, when known.
    pub fn shard(&self) -> Option<ShardKey> {
        match self {
            QueryError::Shard { shard, .. }
            | QueryError::State { shard, .. }
            | QueryError::Timeout { shard, .. } => Some(*shard),
            QueryError::Invalid(_) | QueryError::Task(_) => None,
        }
    }

    /// True when the failure came from a shard's pool or storage rather
    /// than from the request itself.
    pub fn is_shard_failure(&self) -> bool {
        match self {
            QueryError::Shard { .. } | QueryError::Timeout { .. } => true,
            QueryError::State { source, .. } => source.is_storage_failure(),
            QueryError::Invalid(_) | QueryError::Task(_) => false,
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
