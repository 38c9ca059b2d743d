//! The output cache contract used by the coloring engine, and the two
//! reference implementations.
//!
//! The cache is the only shared mutable resource in the engine. Entries are
//! write-once per outpoint: a second insert for the same outpoint is
//! dropped.

use async_trait::async_trait;
use std::collections::{hash_map::Entry, HashMap};
use std::sync::Mutex;

use crate::types::{colored::ColoredOutput, txin::Outpoint};

/// An asynchronous key-value contract keyed by outpoint. Implementations
/// that serve concurrent engines should coalesce concurrent lookups of the
/// same outpoint into a single computation; the reference implementations
/// here do not.
#[async_trait]
pub trait OutputCache: Send + Sync {
    /// Look up the colored output previously stored for `outpoint`.
    async fn get(&self, outpoint: &Outpoint) -> Option<ColoredOutput>;

    /// Store the colored output computed for `outpoint`. Inserting an
    /// outpoint that is already present is a no-op.
    async fn put(&self, outpoint: Outpoint, output: ColoredOutput);
}

/// The identity cache: remembers nothing. Every `get` misses and every
/// `put` is discarded. Exists to simplify testing; with it, the engine
/// recomputes ancestor colors on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl OutputCache for NoCache {
    async fn get(&self, _outpoint: &Outpoint) -> Option<ColoredOutput> {
        None
    }

    async fn put(&self, _outpoint: Outpoint, _output: ColoredOutput) {}
}

/// A process-local in-memory cache over a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    outputs: Mutex<HashMap<Outpoint, ColoredOutput>>,
}

impl MemoryCache {
    /// Instantiate an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of cached outpoints.
    pub fn len(&self) -> usize {
        self.outputs.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// True if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutputCache for MemoryCache {
    async fn get(&self, outpoint: &Outpoint) -> Option<ColoredOutput> {
        self.outputs
            .lock()
            .ok()
            .and_then(|m| m.get(outpoint).cloned())
    }

    async fn put(&self, outpoint: Outpoint, output: ColoredOutput) {
        if let Ok(mut map) = self.outputs.lock() {
            if let Entry::Vacant(slot) = map.entry(outpoint) {
                slot.insert(output);
            }
        }
    }
}
