//! Immutable shard map: shard key → pool, plus the fallback key.

use std::collections::BTreeMap;

use waypoint_core::ShardKey;

use crate::context::ShardContext;
use crate::error::{ShardError, ShardResult};
use crate::pool::ShardPool;

/// One generation of the routing table. Never mutated once built; the
/// catalog replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct ShardMap {
    pools: BTreeMap<ShardKey, ShardPool>,
    default_key: Option<ShardKey>,
    generation: u64,
}

impl ShardMap {
    /// Build a map. The fallback key is `preferred` when mapped, otherwise
    /// the lowest mapped key.
    pub fn new(pools: BTreeMap<ShardKey, ShardPool>, preferred: Option<ShardKey>) -> Self {
        let default_key = preferred
            .filter(|key| pools.contains_key(key))
            .or_else(|| pools.keys().next().copied());
        Self {
            pools,
            default_key,
            generation: 0,
        }
    }

    /// Stamp the map with its swap generation.
    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Swap count at the time this map went live; 0 for a map never swapped in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resolve(&self, key: ShardKey) -> ShardResult<&ShardPool> {
        self.pools.get(&key).ok_or(ShardError::UnknownShard(key))
    }

    /// Route by the bound context key, or the fallback when none is bound.
    pub fn resolve_current(&self, context: &ShardContext) -> ShardResult<(ShardKey, &ShardPool)> {
        let key = context
            .current()
            .or(self.default_key)
            .ok_or(ShardError::NoRoute)?;
        Ok((key, self.resolve(key)?))
    }

    pub fn default_key(&self) -> Option<ShardKey> {
        self.default_key
    }

    pub fn default_pool(&self) -> Option<&ShardPool> {
        self.default_key.and_then(|key| self.pools.get(&key))
    }

    pub fn keys(&self) -> impl Iterator<Item = ShardKey> + '_ {
        self.pools.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShardKey, &ShardPool)> {
        self.pools.iter().map(|(key, pool)| (*key, pool))
    }

    /// The lowest key of each distinct pool. Keys naming the same endpoint
    /// share a pool, so a fan-out over these visits every database once.
    pub fn distinct_keys(&self) -> Vec<ShardKey> {
        let mut seen: Vec<&ShardPool> = Vec::new();
        let mut keys = Vec::new();
        for (key, pool) in &self.pools {
            if !seen.iter().any(|other| other.same_pool(pool)) {
                seen.push(pool);
                keys.push(*key);
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::Endpoint;
    use waypoint_core::config::PoolConfig;

    fn key(c: &str) -> ShardKey {
        c.parse().unwrap()
    }

    fn pools(keys: &[&str]) -> BTreeMap<ShardKey, ShardPool> {
        keys.iter()
            .map(|k| {
                let endpoint = Endpoint::parse(&format!("memory://db_{k}")).unwrap();
                (key(k), ShardPool::connect(&endpoint, &PoolConfig::default()).unwrap())
            })
            .collect()
    }

    #[test]
    fn fallback_prefers_configured_key() {
        let map = ShardMap::new(pools(&["3", "a"]), Some(key("a")));
        assert_eq!(map.default_key(), Some(key("a")));

        let map = ShardMap::new(pools(&["3", "a"]), Some(key("0")));
        assert_eq!(map.default_key(), Some(key("3")));

        assert_eq!(ShardMap::new(BTreeMap::new(), Some(key("0"))).default_key(), None);
    }

    #[test]
    fn distinct_keys_skip_shared_pools() {
        let mut pools = pools(&["2", "9"]);
        let shared = pools[&key("2")].clone();
        pools.insert(key("0"), shared.clone());
        pools.insert(key("f"), shared);

        let map = ShardMap::new(pools, None);
        assert_eq!(map.len(), 4);
        assert_eq!(map.distinct_keys(), [key("0"), key("9")]);
    }

    #[test]
    fn unknown_key_fails_loudly() {
        let map = ShardMap::new(pools(&["0"]), None);
        assert!(map.resolve(key("0")).is_ok());
        assert!(matches!(
            map.resolve(key("b")),
            Err(ShardError::UnknownShard(k)) if k == key("b")
        ));
    }

    #[test]
    fn resolve_current_uses_context_then_fallback() {
        let map = ShardMap::new(pools(&["0", "5"]), None);
        let mut ctx = ShardContext::new();

        let (k, _) = map.resolve_current(&ctx).unwrap();
        assert_eq!(k, key("0"));

        ctx.set_current(key("5"));
        let (k, _) = map.resolve_current(&ctx).unwrap();
        assert_eq!(k, key("5"));

        ctx.set_current(key("e"));
        assert!(map.resolve_current(&ctx).is_err());

        let empty = ShardMap::default();
        assert!(matches!(
            empty.resolve_current(&ShardContext::new()),
            Err(ShardError::NoRoute)
        ));
    }
}
