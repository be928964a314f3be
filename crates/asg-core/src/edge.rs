//! Typed edge storage and the edge-mutation API.
//!
//! Every edge slot of a node is either single-valued (one optional target) or
//! an ordered list of targets. All mutations go through the [`Arena`] methods
//! in this module, which validate fully before touching anything and keep
//! three things in sync:
//!
//! - the forward slot on the source node,
//! - the target's container back-pointer for containment edges,
//! - the reverse-edge index, when one is enabled.

use smallvec::SmallVec;

use crate::arena::{Arena, NodeOperand};
use crate::error::AsgError;
use crate::id::{EdgeKind, NodeId};
use crate::node::Parent;
use crate::schema::{EdgeRole, EdgeShape};

/// Storage of one edge slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeSlot {
    Single(Option<NodeId>),
    /// Insertion-ordered targets. Duplicates are allowed for reference edges.
    Multi(SmallVec<[NodeId; 4]>),
}

impl EdgeSlot {
    pub fn empty(shape: EdgeShape) -> Self {
        match shape {
            EdgeShape::Single => EdgeSlot::Single(None),
            EdgeShape::Multi => EdgeSlot::Multi(SmallVec::new()),
        }
    }

    pub fn targets(&self) -> &[NodeId] {
        match self {
            EdgeSlot::Single(Some(id)) => std::slice::from_ref(id),
            EdgeSlot::Single(None) => &[],
            EdgeSlot::Multi(ids) => ids.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets().is_empty()
    }

    pub fn contains(&self, target: NodeId) -> bool {
        self.targets().contains(&target)
    }

    /// Removes the first occurrence of `target`.
    pub(crate) fn remove_first(&mut self, target: NodeId) -> bool {
        match self {
            EdgeSlot::Single(slot) if *slot == Some(target) => {
                *slot = None;
                true
            }
            EdgeSlot::Single(_) => false,
            EdgeSlot::Multi(ids) => match ids.iter().position(|&id| id == target) {
                Some(pos) => {
                    ids.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    pub(crate) fn take_all(&mut self) -> SmallVec<[NodeId; 4]> {
        match self {
            EdgeSlot::Single(slot) => slot.take().into_iter().collect(),
            EdgeSlot::Multi(ids) => std::mem::take(ids),
        }
    }
}

/// Validated edge operation.
struct EdgeOp {
    source: NodeId,
    slot: usize,
    containment: bool,
}

impl Arena {
    /// Sets a single-valued edge, replacing any previous target.
    ///
    /// For containment edges the target is first detached from its current
    /// container and the replaced target loses its container.
    pub fn set_edge(
        &mut self,
        source: impl NodeOperand,
        edge: EdgeKind,
        target: impl NodeOperand,
    ) -> Result<(), AsgError> {
        let op = self.check_edge(source, edge, EdgeShape::Single)?;
        let target = self.check_target(&op, edge, target)?;

        if op.containment {
            self.detach(target);
        }
        let old = match self.slot_mut(op.source, op.slot) {
            Some(EdgeSlot::Single(slot)) => slot.replace(target),
            _ => None,
        };
        if let Some(old) = old {
            self.unlink(op.source, edge, old, op.containment);
        }
        self.link(op.source, edge, target, op.containment);
        Ok(())
    }

    /// Appends a target to a multi-valued edge.
    pub fn add_edge(
        &mut self,
        source: impl NodeOperand,
        edge: EdgeKind,
        target: impl NodeOperand,
    ) -> Result<(), AsgError> {
        let op = self.check_edge(source, edge, EdgeShape::Multi)?;
        let target = self.check_target(&op, edge, target)?;

        if op.containment {
            self.detach(target);
        }
        if let Some(EdgeSlot::Multi(ids)) = self.slot_mut(op.source, op.slot) {
            ids.push(target);
        }
        self.link(op.source, edge, target, op.containment);
        Ok(())
    }

    /// Removes one occurrence of `target` from `edge`.
    pub fn remove_edge(
        &mut self,
        source: impl NodeOperand,
        edge: EdgeKind,
        target: impl NodeOperand,
    ) -> Result<(), AsgError> {
        let op = self.check_slot(source, edge)?;
        if let Some(arena) = target.owner() {
            if arena != self.id() {
                return Err(self.misuse(AsgError::CrossArena {
                    expected: self.id(),
                    found: arena,
                }));
            }
        }
        let target = target.node_id();

        let removed = self
            .slot_mut(op.source, op.slot)
            .is_some_and(|slot| slot.remove_first(target));
        if !removed {
            return Err(AsgError::EdgeNotFound {
                from: op.source,
                edge,
                target,
            });
        }
        self.unlink(op.source, edge, target, op.containment);
        Ok(())
    }

    /// Removes every target of `edge`, returning how many were removed.
    pub fn clear_edge(&mut self, source: impl NodeOperand, edge: EdgeKind) -> Result<usize, AsgError> {
        let op = self.check_slot(source, edge)?;
        let targets = self
            .slot_mut(op.source, op.slot)
            .map(EdgeSlot::take_all)
            .unwrap_or_default();
        for &target in &targets {
            self.unlink(op.source, edge, target, op.containment);
        }
        Ok(targets.len())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    fn check_slot(&self, source: impl NodeOperand, edge: EdgeKind) -> Result<EdgeOp, AsgError> {
        let source = self.resolve_subject(source)?;
        let kind = self.kind_of(source)?;
        let slot = self
            .schema()
            .layout(kind)
            .and_then(|l| l.edge_slot(edge))
            .ok_or(AsgError::UnknownEdge { kind, edge })?;
        let containment = self
            .schema()
            .edge(edge)
            .is_some_and(|def| def.role == EdgeRole::Containment);
        Ok(EdgeOp {
            source,
            slot,
            containment,
        })
    }

    fn check_edge(&self, source: impl NodeOperand, edge: EdgeKind, shape: EdgeShape) -> Result<EdgeOp, AsgError> {
        let op = self.check_slot(source, edge)?;
        let actual = self.schema().edge(edge).map(|def| def.shape);
        if actual != Some(shape) {
            return Err(AsgError::EdgeShapeMismatch {
                edge,
                actual: match actual {
                    Some(EdgeShape::Single) => "single",
                    _ => "multi",
                },
            });
        }
        Ok(op)
    }

    fn check_target(&self, op: &EdgeOp, edge: EdgeKind, target: impl NodeOperand) -> Result<NodeId, AsgError> {
        let target = self.resolve_target(target)?;
        let Some(expected) = self.schema().edge(edge).map(|def| def.target) else {
            return Err(AsgError::UnknownEdge {
                kind: self.kind_of(op.source)?,
                edge,
            });
        };
        let found = self.kind_of(target)?;
        if !self.schema().is_a(found, expected) {
            return Err(AsgError::InvalidTarget {
                edge,
                target,
                found,
                expected,
            });
        }
        if op.containment && (target == op.source || self.is_ancestor(target, op.source)) {
            return Err(AsgError::ContainmentCycle {
                from: op.source,
                target,
            });
        }
        Ok(target)
    }

    /// Returns `true` if `ancestor` is a (transitive) container of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent.node == ancestor {
                return true;
            }
            current = self.parent(parent.node);
        }
        false
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    /// Detaches `target` from its current container, if any.
    pub(crate) fn detach(&mut self, target: NodeId) {
        let Some(parent) = self.parent(target) else {
            return;
        };
        let slot = self
            .kind_of(parent.node)
            .ok()
            .and_then(|kind| self.schema().layout(kind))
            .and_then(|l| l.edge_slot(parent.edge));
        if let Some(slot) = slot {
            if let Some(edges) = self.slot_mut(parent.node, slot) {
                edges.remove_first(target);
            }
        }
        self.unlink(parent.node, parent.edge, target, true);
    }

    fn link(&mut self, source: NodeId, edge: EdgeKind, target: NodeId, containment: bool) {
        if containment {
            if let Some(node) = self.node_mut(target) {
                node.parent = Some(Parent { node: source, edge });
            }
        }
        if let Some(reverse) = self.reverse.as_mut() {
            reverse.insert(target, source, edge);
        }
    }

    pub(crate) fn unlink(&mut self, source: NodeId, edge: EdgeKind, target: NodeId, containment: bool) {
        if containment {
            if let Some(node) = self.node_mut(target) {
                if node.parent == Some(Parent { node: source, edge }) {
                    node.parent = None;
                }
            }
        }
        if let Some(reverse) = self.reverse.as_mut() {
            reverse.remove(target, source, edge);
        }
    }

    pub(crate) fn slot_mut(&mut self, node: NodeId, slot: usize) -> Option<&mut EdgeSlot> {
        self.node_mut(node)?.edges.get_mut(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::catalog::python::{self, edge, kind};

    fn arena() -> Arena {
        Arena::with_config(
            python::schema(),
            ArenaConfig {
                panic_on_misuse: false,
            },
        )
    }

    #[test]
    fn set_edge_links_parent() {
        let mut arena = arena();
        let assign = arena.create(kind::ASSIGN).unwrap();
        let value = arena.create(kind::INTEGER_LITERAL).unwrap();
        arena.set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, value).unwrap();

        let node = arena.get(assign).unwrap();
        assert_eq!(node.raw_targets(edge::ASSIGN_HAS_EXPRESSION), &[value]);
        assert_eq!(
            arena.parent(value),
            Some(Parent {
                node: assign,
                edge: edge::ASSIGN_HAS_EXPRESSION
            })
        );
    }

    #[test]
    fn replacing_single_target_releases_old_child() {
        let mut arena = arena();
        let ret = arena.create(kind::RETURN).unwrap();
        let a = arena.create(kind::IDENTIFIER).unwrap();
        let b = arena.create(kind::IDENTIFIER).unwrap();
        arena.set_edge(ret, edge::RETURN_HAS_EXPRESSION, a).unwrap();
        arena.set_edge(ret, edge::RETURN_HAS_EXPRESSION, b).unwrap();
        assert_eq!(arena.parent(a), None);
        assert_eq!(arena.parent(b).map(|p| p.node), Some(ret));
    }

    #[test]
    fn containment_moves_target_between_containers() {
        let mut arena = arena();
        let first = arena.create(kind::SUITE).unwrap();
        let second = arena.create(kind::SUITE).unwrap();
        let stmt = arena.create(kind::RETURN).unwrap();
        arena.add_edge(first, edge::SUITE_HAS_STATEMENT, stmt).unwrap();
        arena.add_edge(second, edge::SUITE_HAS_STATEMENT, stmt).unwrap();

        assert!(arena.get(first).unwrap().raw_targets(edge::SUITE_HAS_STATEMENT).is_empty());
        assert_eq!(arena.get(second).unwrap().raw_targets(edge::SUITE_HAS_STATEMENT), &[stmt]);
        assert_eq!(arena.parent(stmt).map(|p| p.node), Some(second));
    }

    #[test]
    fn multi_edges_keep_insertion_order_and_duplicates() {
        let mut arena = arena();
        let module = arena.create(kind::MODULE).unwrap();
        let obj_a = arena.create(kind::OBJECT).unwrap();
        let obj_b = arena.create(kind::OBJECT).unwrap();
        for target in [obj_b, obj_a, obj_b] {
            arena.add_edge(module, edge::MODULE_HAS_OBJECT, target).unwrap();
        }
        assert_eq!(
            arena.get(module).unwrap().raw_targets(edge::MODULE_HAS_OBJECT),
            &[obj_b, obj_a, obj_b]
        );

        arena.remove_edge(module, edge::MODULE_HAS_OBJECT, obj_b).unwrap();
        assert_eq!(
            arena.get(module).unwrap().raw_targets(edge::MODULE_HAS_OBJECT),
            &[obj_a, obj_b]
        );
    }

    #[test]
    fn invalid_target_leaves_graph_unchanged() {
        let mut arena = arena();
        let assign = arena.create(kind::ASSIGN).unwrap();
        let suite = arena.create(kind::SUITE).unwrap();
        let err = arena.set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, suite).unwrap_err();
        assert_eq!(
            err,
            AsgError::InvalidTarget {
                edge: edge::ASSIGN_HAS_EXPRESSION,
                target: suite,
                found: kind::SUITE,
                expected: kind::EXPRESSION
            }
        );
        assert!(arena.get(assign).unwrap().raw_targets(edge::ASSIGN_HAS_EXPRESSION).is_empty());
    }

    #[test]
    fn dangling_target_is_rejected() {
        let mut arena = arena();
        let assign = arena.create(kind::ASSIGN).unwrap();
        let err = arena
            .set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, NodeId(77))
            .unwrap_err();
        assert_eq!(err, AsgError::DanglingReference { id: NodeId(77) });
    }

    #[test]
    fn edge_must_belong_to_source_layout() {
        let mut arena = arena();
        let ret = arena.create(kind::RETURN).unwrap();
        let value = arena.create(kind::IDENTIFIER).unwrap();
        let err = arena.set_edge(ret, edge::ASSIGN_HAS_EXPRESSION, value).unwrap_err();
        assert_eq!(
            err,
            AsgError::UnknownEdge {
                kind: kind::RETURN,
                edge: edge::ASSIGN_HAS_EXPRESSION
            }
        );
    }

    #[test]
    fn shape_is_checked() {
        let mut arena = arena();
        let assign = arena.create(kind::ASSIGN).unwrap();
        let value = arena.create(kind::IDENTIFIER).unwrap();
        assert!(matches!(
            arena.add_edge(assign, edge::ASSIGN_HAS_EXPRESSION, value),
            Err(AsgError::EdgeShapeMismatch { actual: "single", .. })
        ));
        assert!(matches!(
            arena.set_edge(assign, edge::ASSIGN_HAS_TARGET, value),
            Err(AsgError::EdgeShapeMismatch { actual: "multi", .. })
        ));
    }

    #[test]
    fn containment_cycle_is_rejected() {
        let mut arena = arena();
        let outer = arena.create(kind::BINARY_ARITHMETIC).unwrap();
        let inner = arena.create(kind::BINARY_ARITHMETIC).unwrap();
        arena.set_edge(outer, edge::ARITHMETIC_HAS_LEFT, inner).unwrap();

        let err = arena.set_edge(inner, edge::ARITHMETIC_HAS_LEFT, outer).unwrap_err();
        assert_eq!(err, AsgError::ContainmentCycle { from: inner, target: outer });
        let err = arena.set_edge(outer, edge::ARITHMETIC_HAS_RIGHT, outer).unwrap_err();
        assert_eq!(err, AsgError::ContainmentCycle { from: outer, target: outer });
        // The existing edge is untouched.
        assert_eq!(arena.parent(inner).map(|p| p.node), Some(outer));
    }

    #[test]
    fn remove_missing_edge_fails() {
        let mut arena = arena();
        let call = arena.create(kind::CALL).unwrap();
        let arg = arena.create(kind::IDENTIFIER).unwrap();
        assert_eq!(
            arena.remove_edge(call, edge::CALL_HAS_ARGUMENT, arg).unwrap_err(),
            AsgError::EdgeNotFound {
                from: call,
                edge: edge::CALL_HAS_ARGUMENT,
                target: arg
            }
        );
    }

    #[test]
    fn remove_containment_edge_clears_parent() {
        let mut arena = arena();
        let call = arena.create(kind::CALL).unwrap();
        let arg = arena.create(kind::IDENTIFIER).unwrap();
        arena.add_edge(call, edge::CALL_HAS_ARGUMENT, arg).unwrap();
        arena.remove_edge(call, edge::CALL_HAS_ARGUMENT, arg).unwrap();
        assert_eq!(arena.parent(arg), None);
    }

    #[test]
    fn clear_edge_releases_all_targets() {
        let mut arena = arena();
        let call = arena.create(kind::CALL).unwrap();
        let args: Vec<_> = (0..3).map(|_| arena.create(kind::IDENTIFIER).unwrap()).collect();
        for &arg in &args {
            arena.add_edge(call, edge::CALL_HAS_ARGUMENT, arg).unwrap();
        }
        assert_eq!(arena.clear_edge(call, edge::CALL_HAS_ARGUMENT).unwrap(), 3);
        assert!(args.iter().all(|&a| arena.parent(a).is_none()));
    }

    #[test]
    fn cross_arena_target_is_rejected() {
        let mut left = arena();
        let mut right = arena();
        let assign = left.create(kind::ASSIGN).unwrap();
        let foreign = right.create(kind::IDENTIFIER).unwrap();
        let handle = right.handle(foreign);
        let err = left
            .set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, handle)
            .unwrap_err();
        assert_eq!(
            err,
            AsgError::CrossArena {
                expected: left.id(),
                found: right.id()
            }
        );
    }

    #[test]
    fn foreign_source_is_a_factory_mismatch() {
        let mut left = arena();
        let mut right = arena();
        let foreign = right.create(kind::ASSIGN).unwrap();
        let value = left.create(kind::IDENTIFIER).unwrap();
        let err = left
            .set_edge(right.handle(foreign), edge::ASSIGN_HAS_EXPRESSION, value)
            .unwrap_err();
        assert!(matches!(err, AsgError::FactoryMismatch { .. }));
    }

    #[test]
    #[should_panic(expected = "arena misuse")]
    fn misuse_panics_when_configured() {
        let mut left = Arena::with_config(python::schema(), ArenaConfig { panic_on_misuse: true });
        let mut right = arena();
        let assign = left.create(kind::ASSIGN).unwrap();
        let foreign = right.create(kind::IDENTIFIER).unwrap();
        let _ = left.set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, right.handle(foreign));
    }
}
