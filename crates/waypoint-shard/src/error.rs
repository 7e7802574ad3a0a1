//! Shard routing error types.

use thiserror::Error;

use waypoint_core::{EndpointError, ShardKey};

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("no shard mapped for key {0}")]
    UnknownShard(ShardKey),

    #[error("no shard context bound and no default shard configured")]
    NoRoute,

    #[error("invalid shard key {key:?} in shard map")]
    InvalidKey { key: String },

    #[error("invalid endpoint for shard {key}: {source}")]
    InvalidEndpoint {
        key: String,
        #[source]
        source: EndpointError,
    },

    #[error("shard map source failed: {0}")]
    Source(String),

    #[error("shard {shard} unavailable: {reason}")]
    Unavailable { shard: String, reason: String },

    #[error("timed out acquiring a connection for shard {shard} after {waited_ms}ms")]
    AcquireTimeout { shard: String, waited_ms: u64 },

    #[error("shard map reload failed: {0}")]
    ReloadFailed(String),

    #[error("state store error: {0}")]
    State(#[from] waypoint_state::StateError),
}

pub type ShardResult<T> = Result<T, ShardError>;
