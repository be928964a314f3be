//! Deterministic structural hashing for graph nodes using blake3.
//!
//! The structural hash of a node combines its kind name, optionally its
//! similarity-relevant attributes, and the hashes of its containment
//! children in layout order (Merkle composition). Reference edges contribute
//! only their kind and the target's kind, so a hash covers exactly one
//! subtree. Filtered children are skipped.
//!
//! # Determinism
//!
//! - Strings are hashed by content, never by string-table key, so equal
//!   subtrees in different arenas hash equally.
//! - Positional attributes are excluded, so moving code does not change its
//!   hash.
//! - Children are composed in schema layout order, then insertion order.
//!
//! A node already present in the caller's visited set hashes to the
//! [`cycle_sentinel`] instead of being walked again.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use asg_core::{Arena, AttrValue, NodeId, NodeRef};

use crate::error::StorageError;

/// Hashing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Include similarity-relevant attribute values. When off, only the
    /// shape of the subtree counts.
    pub with_attributes: bool,
}

impl Default for HashConfig {
    fn default() -> Self {
        HashConfig { with_attributes: true }
    }
}

/// Hash returned for a node that was already visited.
pub fn cycle_sentinel() -> blake3::Hash {
    blake3::Hash::from([0u8; 32])
}

/// Caller-owned cache of structural hashes.
///
/// Entries are not invalidated automatically: after mutating a node, call
/// [`HashCache::invalidate`] for it (and its ancestors) or [`HashCache::clear`].
#[derive(Debug, Default)]
pub struct HashCache {
    hashes: HashMap<NodeId, blake3::Hash>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<blake3::Hash> {
        self.hashes.get(&id).copied()
    }

    pub fn invalidate(&mut self, id: NodeId) {
        self.hashes.remove(&id);
    }

    /// Drops `id` and every container above it.
    pub fn invalidate_path(&mut self, arena: &Arena, id: NodeId) {
        self.hashes.remove(&id);
        let mut current = arena.parent(id);
        while let Some(parent) = current {
            self.hashes.remove(&parent.node);
            current = arena.parent(parent.node);
        }
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Structural hash of `node`, guarded by `visited`.
///
/// Every node hashed during the call is added to `visited`. Returns the
/// [`cycle_sentinel`] if `node` is already in the set or is not live.
pub fn structural_hash(
    arena: &Arena,
    node: NodeId,
    config: &HashConfig,
    visited: &mut HashSet<NodeId>,
) -> blake3::Hash {
    hash_node(arena, node, config, visited, None)
}

/// Structural hash of a live node, memoized in `cache`.
pub fn structural_hash_cached(
    arena: &Arena,
    node: NodeId,
    config: &HashConfig,
    cache: &mut HashCache,
) -> Result<blake3::Hash, StorageError> {
    if !arena.contains(node) {
        return Err(asg_core::AsgError::NodeNotFound { id: node }.into());
    }
    let mut visited = HashSet::new();
    Ok(hash_node(arena, node, config, &mut visited, Some(cache)))
}

/// Hashes of every visible root, in id order.
pub fn hash_roots(arena: &Arena, config: &HashConfig, cache: &mut HashCache) -> Vec<(NodeId, blake3::Hash)> {
    let roots: Vec<NodeId> = arena.roots().filter(|n| !n.is_filtered()).map(|n| n.id()).collect();
    let mut visited = HashSet::new();
    let hashes = roots
        .into_iter()
        .map(|id| (id, hash_node(arena, id, config, &mut visited, Some(&mut *cache))))
        .collect();
    tracing::debug!(cached = cache.len(), "hashed roots");
    hashes
}

/// Single hash over all visible roots.
pub fn graph_hash(arena: &Arena, config: &HashConfig) -> blake3::Hash {
    let mut cache = HashCache::new();
    let mut hasher = blake3::Hasher::new();
    hasher.update(arena.schema().name().as_bytes());
    for (_, hash) in hash_roots(arena, config, &mut cache) {
        hasher.update(hash.as_bytes());
    }
    hasher.finalize()
}

fn hash_node(
    arena: &Arena,
    id: NodeId,
    config: &HashConfig,
    visited: &mut HashSet<NodeId>,
    mut cache: Option<&mut HashCache>,
) -> blake3::Hash {
    if let Some(hash) = cache.as_ref().and_then(|c| c.get(id)) {
        return hash;
    }
    if !visited.insert(id) {
        tracing::trace!(node = %id, "hash revisit");
        return cycle_sentinel();
    }
    let Some(node) = arena.get(id) else {
        return cycle_sentinel();
    };

    let mut hasher = blake3::Hasher::new();
    hasher.update(node.kind_name().as_bytes());
    hasher.update(&[0]);
    if config.with_attributes {
        hash_attrs(node, &mut hasher);
    }

    let schema = arena.schema();
    for (edge, targets) in node.edges() {
        let Some(def) = schema.edge(edge) else {
            continue;
        };
        for &target in targets {
            let Some(child) = arena.get_visible(target) else {
                continue;
            };
            hasher.update(&edge.0.to_le_bytes());
            if def.is_containment() {
                let child_hash = hash_node(arena, target, config, visited, cache.as_deref_mut());
                hasher.update(child_hash.as_bytes());
            } else {
                hasher.update(child.kind_name().as_bytes());
                hasher.update(&[0]);
            }
        }
    }

    let hash = hasher.finalize();
    if let Some(cache) = cache {
        cache.hashes.insert(id, hash);
    }
    hash
}

fn hash_attrs(node: NodeRef<'_>, hasher: &mut blake3::Hasher) {
    let schema = node.arena().schema();
    for (attr, value) in node.attrs() {
        if !schema.attr(attr).is_some_and(|def| def.in_similarity) {
            continue;
        }
        hasher.update(&attr.0.to_le_bytes());
        match value {
            AttrValue::Bool(b) => hasher.update(&[u8::from(b)]),
            AttrValue::Int(v) => hasher.update(&v.to_le_bytes()),
            AttrValue::Enum(v) => hasher.update(&[v]),
            AttrValue::Str(key) => {
                let text = node.arena().strings().get(key).unwrap_or("");
                hasher.update(&(text.len() as u32).to_le_bytes());
                hasher.update(text.as_bytes())
            }
        };
    }
}
