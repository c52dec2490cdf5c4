//! Path-keyed memo of converted subtrees.
//!
//! Two parallel LRU stores share the same path keys: one keeps the node that
//! was converted at a path (the snapshot), the other keeps what the factory
//! produced for it. A lookup only counts as a hit when both are present.
//!
//! Produced elements depend on the conversion options, so the cache also
//! remembers the options its entries were built under and empties itself when
//! a pass runs with different ones.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::factory::Child;
use crate::node::SemanticNode;
use crate::options::RuntimeOptions;
use crate::schema::Space;

/// Capacity used by the converter when it is handed no cache of its own
pub const DEFAULT_CAPACITY: usize = 200;

/// Capacity of the cache owned by the markdown orchestrator
pub const MARKDOWN_CACHE_CAPACITY: usize = 500;

/// The node converted at a path, with what is needed to validate reuse
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub node: SemanticNode,
    /// Key the element was produced under
    pub key: Option<String>,
    /// Semantic nodes covered by this subtree
    pub size: usize,
    /// Subtree fingerprint, recorded in fingerprint mode only
    pub fingerprint: Option<u64>,
    /// Attribute space the node was converted in
    pub space: Space,
}

pub struct NodeCache<E> {
    snapshots: LruCache<String, Snapshot>,
    results: LruCache<String, Child<E>>,
    /// Options every stored element was produced under
    options: Option<RuntimeOptions>,
}

impl<E: Clone> NodeCache<E> {
    /// Create a cache holding at most `capacity` paths (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            snapshots: LruCache::new(cap),
            results: LruCache::new(cap),
            options: None,
        }
    }

    /// Look up `path`, marking it as most recently used
    pub fn get(&mut self, path: &str) -> Option<(&Snapshot, &Child<E>)> {
        let snapshot = self.snapshots.get(path)?;
        let result = self.results.get(path)?;
        Some((snapshot, result))
    }

    /// Look up `path` without touching recency
    pub fn peek(&self, path: &str) -> Option<(&Snapshot, &Child<E>)> {
        Some((self.snapshots.peek(path)?, self.results.peek(path)?))
    }

    /// Store the snapshot and produced element for `path`, evicting the least
    /// recently used path when full
    pub fn set(&mut self, path: String, snapshot: Snapshot, element: Child<E>) {
        self.results.put(path.clone(), element);
        self.snapshots.put(path, snapshot);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.snapshots.contains(path) && self.results.contains(path)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.snapshots.cap().get()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.results.clear();
    }

    /// Drop every entry unless it was produced under `options`
    pub fn retain_for(&mut self, options: &RuntimeOptions) {
        if self.options.as_ref() == Some(options) {
            return;
        }
        if !self.is_empty() {
            debug!(entries = self.len(), "conversion options changed, clearing cache");
        }
        self.clear();
        self.options = Some(options.clone());
    }
}

impl<E: Clone> Default for NodeCache<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<E> std::fmt::Debug for NodeCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCache")
            .field("len", &self.snapshots.len())
            .field("capacity", &self.snapshots.cap())
            .finish()
    }
}

/// Counters for one conversion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassStats {
    /// Lookups answered from the cache
    pub hits: usize,
    /// Lookups that had to convert
    pub misses: usize,
    /// Semantic nodes covered by cache hits
    pub reused_nodes: usize,
    /// Semantic nodes converted from scratch
    pub converted_nodes: usize,
}
