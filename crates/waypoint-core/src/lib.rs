pub mod config;
pub mod endpoint;
pub mod shard_key;
pub mod sort;
pub mod types;
pub mod validate;

pub use config::WaypointConfig;
pub use endpoint::{Endpoint, EndpointError};
pub use shard_key::{IdError, IdGenerator, ShardKey, generate_id_for, shard_key_of};
pub use sort::{Direction, PlanComparator, PlanField, SortOrder};
pub use types::*;
pub use validate::ValidationError;
