//! Reverse-edge index: from a target node back to the nodes pointing at it.
//!
//! The index is optional. An arena without one pays nothing on edge
//! mutation; once enabled (see [`Arena::enable_reverse_edges`]) it is built by
//! one full preorder traversal and then maintained incrementally by every
//! edge operation, so it stays the exact inverse of the forward edge set.
//!
//! Multi-valued reference edges may list the same target more than once, so
//! each source carries a multiplicity and only disappears from the index when
//! its last forward edge is removed.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::arena::Arena;
use crate::id::{EdgeKind, NodeId};
use crate::node::NodeRef;
use crate::traversal::{Preorder, PreorderConfig};
use crate::visitor::Visitor;

type SourceSet = IndexMap<NodeId, u32>;

/// Derived index of incoming edges.
#[derive(Debug, Clone, Default)]
pub struct ReverseEdges {
    incoming: HashMap<NodeId, IndexMap<EdgeKind, SourceSet>>,
    edge_count: usize,
}

impl ReverseEdges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index with one preorder pass over every node, filtered and
    /// special nodes included.
    pub fn build(arena: &Arena) -> Self {
        let mut collector = Collector {
            index: ReverseEdges::new(),
        };
        let config = PreorderConfig {
            safe_mode: true,
            visit_filtered_edges: true,
            visit_special_nodes: true,
            used_special_only: false,
            ..PreorderConfig::default()
        };
        let summary = {
            let mut preorder = Preorder::new(config);
            preorder.add_visitor(&mut collector);
            preorder.run(arena)
        };
        tracing::debug!(
            nodes = summary.visited,
            edges = collector.index.edge_count,
            "built reverse-edge index"
        );
        collector.index
    }

    pub(crate) fn insert(&mut self, target: NodeId, source: NodeId, edge: EdgeKind) {
        *self
            .incoming
            .entry(target)
            .or_default()
            .entry(edge)
            .or_default()
            .entry(source)
            .or_insert(0) += 1;
        self.edge_count += 1;
    }

    pub(crate) fn remove(&mut self, target: NodeId, source: NodeId, edge: EdgeKind) {
        let Some(by_edge) = self.incoming.get_mut(&target) else {
            return;
        };
        let Some(sources) = by_edge.get_mut(&edge) else {
            return;
        };
        let Some(count) = sources.get_mut(&source) else {
            return;
        };
        *count -= 1;
        self.edge_count -= 1;
        if *count == 0 {
            sources.shift_remove(&source);
            if sources.is_empty() {
                by_edge.shift_remove(&edge);
                if by_edge.is_empty() {
                    self.incoming.remove(&target);
                }
            }
        }
    }

    /// Drops every entry naming `target`.
    pub(crate) fn forget(&mut self, target: NodeId) {
        if let Some(by_edge) = self.incoming.remove(&target) {
            let dropped: u32 = by_edge.values().flat_map(|s| s.values()).sum();
            self.edge_count -= dropped as usize;
        }
    }

    /// Sources whose `edge` points at `target`, in insertion order.
    ///
    /// The returned iterator is lazy and can be cloned to restart it.
    pub fn sources(&self, target: NodeId, edge: EdgeKind) -> Sources<'_> {
        Sources {
            inner: self
                .incoming
                .get(&target)
                .and_then(|by_edge| by_edge.get(&edge))
                .map(|sources| sources.keys()),
        }
    }

    /// Every `(edge, source)` pair pointing at `target`.
    pub fn incoming(&self, target: NodeId) -> impl Iterator<Item = (EdgeKind, NodeId)> + '_ {
        self.incoming
            .get(&target)
            .into_iter()
            .flat_map(|by_edge| by_edge.iter())
            .flat_map(|(&edge, sources)| sources.keys().map(move |&source| (edge, source)))
    }

    /// Number of forward edges the index accounts for.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

/// Lazy, restartable sequence of source ids.
#[derive(Debug, Clone)]
pub struct Sources<'a> {
    inner: Option<indexmap::map::Keys<'a, NodeId, u32>>,
}

impl Iterator for Sources<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.inner.as_mut()?.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(keys) => keys.size_hint(),
            None => (0, Some(0)),
        }
    }
}

impl PartialEq for ReverseEdges {
    fn eq(&self, other: &Self) -> bool {
        if self.edge_count != other.edge_count || self.incoming.len() != other.incoming.len() {
            return false;
        }
        self.incoming.iter().all(|(target, by_edge)| {
            other.incoming.get(target).is_some_and(|theirs| {
                by_edge.len() == theirs.len()
                    && by_edge.iter().all(|(edge, sources)| {
                        theirs.get(edge).is_some_and(|s| {
                            s.len() == sources.len() && sources.iter().all(|(src, n)| s.get(src) == Some(n))
                        })
                    })
            })
        })
    }
}

struct Collector {
    index: ReverseEdges,
}

impl Visitor for Collector {
    fn visit_edge(&mut self, edge: EdgeKind, source: NodeRef<'_>, target: NodeRef<'_>) {
        self.index.insert(target.id(), source.id(), edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::python::{self, edge, kind};
    use crate::error::AsgError;

    #[test]
    fn query_without_index_fails() {
        let arena = Arena::new(python::schema());
        assert!(matches!(
            arena.reverse_sources(NodeId(1), edge::IDENTIFIER_REFERS_TO),
            Err(AsgError::ReverseEdgesDisabled)
        ));
    }

    #[test]
    fn build_indexes_existing_edges() {
        let mut arena = Arena::new(python::schema());
        let module = arena.create(kind::MODULE).unwrap();
        let obj = arena.create(kind::OBJECT).unwrap();
        let a = arena.create(kind::IDENTIFIER).unwrap();
        let b = arena.create(kind::IDENTIFIER).unwrap();
        let assign = arena.create(kind::ASSIGN).unwrap();
        arena.add_edge(module, edge::MODULE_HAS_STATEMENT, assign).unwrap();
        arena.add_edge(assign, edge::ASSIGN_HAS_TARGET, a).unwrap();
        arena.set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, b).unwrap();
        arena.set_edge(a, edge::IDENTIFIER_REFERS_TO, obj).unwrap();
        arena.set_edge(b, edge::IDENTIFIER_REFERS_TO, obj).unwrap();
        arena.add_edge(module, edge::MODULE_HAS_OBJECT, obj).unwrap();

        arena.enable_reverse_edges();
        let refs: Vec<_> = arena
            .reverse_sources(obj, edge::IDENTIFIER_REFERS_TO)
            .unwrap()
            .collect();
        assert_eq!(refs, vec![a, b]);
        let owners: Vec<_> = arena
            .reverse_sources(assign, edge::MODULE_HAS_STATEMENT)
            .unwrap()
            .collect();
        assert_eq!(owners, vec![module]);
        assert_eq!(arena.reverse_edges().unwrap().edge_count(), 6);
    }

    #[test]
    fn incremental_updates_follow_mutations() {
        let mut arena = Arena::new(python::schema());
        arena.enable_reverse_edges();
        let module = arena.create(kind::MODULE).unwrap();
        let obj = arena.create(kind::OBJECT).unwrap();
        arena.add_edge(module, edge::MODULE_HAS_OBJECT, obj).unwrap();
        arena.add_edge(module, edge::MODULE_HAS_OBJECT, obj).unwrap();

        arena.remove_edge(module, edge::MODULE_HAS_OBJECT, obj).unwrap();
        // One forward edge remains, so the source stays listed.
        let sources: Vec<_> = arena.reverse_sources(obj, edge::MODULE_HAS_OBJECT).unwrap().collect();
        assert_eq!(sources, vec![module]);

        arena.remove_edge(module, edge::MODULE_HAS_OBJECT, obj).unwrap();
        assert_eq!(arena.reverse_sources(obj, edge::MODULE_HAS_OBJECT).unwrap().count(), 0);
        assert!(arena.reverse_edges().unwrap().is_empty());
    }

    #[test]
    fn sources_iterator_is_restartable() {
        let mut arena = Arena::new(python::schema());
        arena.enable_reverse_edges();
        let obj = arena.create(kind::OBJECT).unwrap();
        let ids: Vec<_> = (0..3).map(|_| arena.create(kind::IDENTIFIER).unwrap()).collect();
        for &id in &ids {
            arena.set_edge(id, edge::IDENTIFIER_REFERS_TO, obj).unwrap();
        }
        let sources = arena.reverse_sources(obj, edge::IDENTIFIER_REFERS_TO).unwrap();
        let first: Vec<_> = sources.clone().collect();
        let second: Vec<_> = sources.collect();
        assert_eq!(first, ids);
        assert_eq!(first, second);
    }

    #[test]
    fn moving_containment_updates_index() {
        let mut arena = Arena::new(python::schema());
        arena.enable_reverse_edges();
        let s1 = arena.create(kind::SUITE).unwrap();
        let s2 = arena.create(kind::SUITE).unwrap();
        let ret = arena.create(kind::RETURN).unwrap();
        arena.add_edge(s1, edge::SUITE_HAS_STATEMENT, ret).unwrap();
        arena.add_edge(s2, edge::SUITE_HAS_STATEMENT, ret).unwrap();
        let owners: Vec<_> = arena.reverse_sources(ret, edge::SUITE_HAS_STATEMENT).unwrap().collect();
        assert_eq!(owners, vec![s2]);
    }

    #[test]
    fn disable_drops_index() {
        let mut arena = Arena::new(python::schema());
        arena.enable_reverse_edges();
        assert!(arena.reverse_edges_enabled());
        arena.disable_reverse_edges();
        assert!(!arena.reverse_edges_enabled());
        assert!(arena.reverse_edges().is_err());
    }
}
