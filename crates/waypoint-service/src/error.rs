//! Service error taxonomy.
//!
//! Every failure a caller can see falls into one of these kinds, each with a
//! stable machine-readable code and an HTTP-equivalent status.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use waypoint_core::{IdError, ShardKey, ValidationError};
use waypoint_state::StateError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("conflict: {entity} (id: {id}) was updated by another user, expected version {expected} but found {actual}")]
    VersionConflict {
        entity: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("position {requested} is outside 1..={max}")]
    InvalidPosition { requested: u32, max: u32 },

    #[error("shard {shard} unavailable: {reason}")]
    ShardUnavailable {
        shard: ShardKey,
        reason: String,
        retry_after: Duration,
    },

    #[error("shard map reload failed: {0}")]
    ShardMapReload(String),

    #[error("listing failed: {reason}")]
    AggregateQuery {
        reason: String,
        retry_after: Duration,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP-equivalent status.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound { .. } => 404,
            ServiceError::VersionConflict { .. } => 409,
            ServiceError::Validation(_) | ServiceError::InvalidPosition { .. } => 400,
            ServiceError::ShardUnavailable { .. } | ServiceError::AggregateQuery { .. } => 503,
            ServiceError::ShardMapReload(_) | ServiceError::Internal(_) => 500,
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::VersionConflict { .. } => "version_conflict",
            ServiceError::Validation(_) | ServiceError::InvalidPosition { .. } => {
                "validation_failed"
            }
            ServiceError::ShardUnavailable { .. } => "shard_unavailable",
            ServiceError::ShardMapReload(_) => "shard_map_reload_failed",
            ServiceError::AggregateQuery { .. } => "aggregate_query_failed",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// How long the caller should wait before retrying, for retryable kinds.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::ShardUnavailable { retry_after, .. }
            | ServiceError::AggregateQuery { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status_code(),
            error: self.code(),
            message: self.to_string(),
            retry_after_secs: self.retry_after().map(|d| d.as_secs().max(1)),
        }
    }
}

/// Serializable error shape for an outer transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Store errors that are not storage failures. Storage failures go through
/// the recovery path instead.
impl From<StateError> for ServiceError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            StateError::VersionConflict {
                entity,
                id,
                expected,
                actual,
            } => ServiceError::VersionConflict {
                entity,
                id,
                expected,
                actual,
            },
            StateError::PositionOutOfRange { requested, max } => {
                ServiceError::InvalidPosition { requested, max }
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<IdError> for ServiceError {
    fn from(e: IdError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
