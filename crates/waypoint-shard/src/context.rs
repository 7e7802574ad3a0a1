//! Shard context: which shard the current unit of work targets.
//!
//! The context is an ordinary value owned by the unit of work, never a
//! process-wide or thread-local slot. Worker tasks get their own context.

use std::ops::{Deref, DerefMut};

use waypoint_core::ShardKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardContext {
    current: Option<ShardKey>,
}

impl ShardContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&mut self, key: ShardKey) {
        self.current = Some(key);
    }

    pub fn current(&self) -> Option<ShardKey> {
        self.current
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Bind `key` until the returned guard drops. The binding is cleared on
    /// every exit path, including unwinding.
    pub fn bind(&mut self, key: ShardKey) -> ContextGuard<'_> {
        self.set_current(key);
        ContextGuard { context: self }
    }
}

/// Scoped shard binding; see [`ShardContext::bind`].
#[derive(Debug)]
pub struct ContextGuard<'a> {
    context: &'a mut ShardContext,
}

impl Deref for ContextGuard<'_> {
    type Target = ShardContext;

    fn deref(&self) -> &ShardContext {
        self.context
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut ShardContext {
        self.context
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.context.clear();
    }
}
