//! Shard keys and shard-bound identifier generation.
//!
//! A shard key is the least-significant hex nibble of a 128-bit identifier,
//! i.e. the last character of its canonical UUID string. The key space is
//! therefore fixed at 16 symbols (`0`-`9`, `a`-`f`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default upper bound on rejection-sampling draws per generated id.
///
/// With 16 uniformly distributed keys the chance of exhausting 1024 draws
/// is (15/16)^1024, far below anything observable.
pub const DEFAULT_MAX_DRAWS: u32 = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid shard key {0:?}: expected a single hex symbol 0-9 or a-f")]
    InvalidShardKey(String),

    #[error("no identifier for shard {key} after {draws} draws; key space exhausted or misconfigured")]
    Exhausted { key: ShardKey, draws: u32 },
}

/// Token naming one of the 16 partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShardKey(u8);

impl ShardKey {
    /// Size of the key space.
    pub const COUNT: usize = 16;

    pub fn from_nibble(nibble: u8) -> Option<Self> {
        (nibble < Self::COUNT as u8).then_some(Self(nibble))
    }

    pub fn nibble(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        char::from_digit(u32::from(self.0), 16).unwrap_or('0')
    }

    /// Every key in the space, in ascending order.
    pub fn all() -> impl Iterator<Item = ShardKey> {
        (0..Self::COUNT as u8).map(ShardKey)
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for ShardKey {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c
                .to_digit(16)
                .map(|d| ShardKey(d as u8))
                .ok_or_else(|| IdError::InvalidShardKey(s.to_string())),
            _ => Err(IdError::InvalidShardKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for ShardKey {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShardKey> for String {
    fn from(key: ShardKey) -> Self {
        key.to_string()
    }
}

/// Project an identifier onto its shard key.
pub fn shard_key_of(id: &Uuid) -> ShardKey {
    ShardKey(id.as_bytes()[15] & 0x0f)
}

/// Draws random identifiers bound to a requested shard.
#[derive(Debug, Clone, Copy)]
pub struct IdGenerator {
    max_draws: u32,
}

impl IdGenerator {
    pub fn new(max_draws: u32) -> Self {
        Self {
            max_draws: max_draws.max(1),
        }
    }

    pub fn max_draws(&self) -> u32 {
        self.max_draws
    }

    /// Generate a random v4 id whose shard key is `key`.
    pub fn generate_for(&self, key: ShardKey) -> Result<Uuid, IdError> {
        self.generate_with(key, Uuid::new_v4)
    }

    /// Rejection-sample ids from `draw` until one maps to `key`.
    pub fn generate_with(
        &self,
        key: ShardKey,
        mut draw: impl FnMut() -> Uuid,
    ) -> Result<Uuid, IdError> {
        for _ in 0..self.max_draws {
            let id = draw();
            if shard_key_of(&id) == key {
                return Ok(id);
            }
        }
        Err(IdError::Exhausted {
            key,
            draws: self.max_draws,
        })
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DRAWS)
    }
}

/// Generate an id for `key` with the default draw bound.
pub fn generate_id_for(key: ShardKey) -> Result<Uuid, IdError> {
    IdGenerator::default().generate_for(key)
}
