//! Node storage and the borrowed [`NodeRef`] view.
//!
//! A [`Node`] is plain data owned by its [`Arena`]: a kind tag, one
//! [`AttrValue`] per attribute slot and one [`EdgeSlot`] per edge slot of the
//! kind's [`Layout`](crate::schema::Layout), plus the back-pointer to its
//! container. Nodes never point at each other directly; every relation is a
//! [`NodeId`] routed through the arena.
//!
//! Callers never hold a `Node` by value. They get a [`NodeRef`], a cheap
//! `Copy` view that borrows the arena and resolves ids, strings, filtering and
//! capability roles on demand.

use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::capability::{NamedView, PositionedView};
use crate::edge::EdgeSlot;
use crate::id::{AttrId, EdgeKind, Key, NodeHandle, NodeId, NodeKind};
use crate::schema::AttrType;

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// Value of one attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i32),
    /// Variant index into the attribute's variant table.
    Enum(u8),
    /// String-table key.
    Str(Key),
}

impl AttrValue {
    /// The zero value for an attribute of type `ty`.
    pub fn default_for(ty: &AttrType) -> Self {
        match ty {
            AttrType::Bool => AttrValue::Bool(false),
            AttrType::Int => AttrValue::Int(0),
            AttrType::Enum(_) => AttrValue::Enum(0),
            AttrType::Str => AttrValue::Str(Key::EMPTY),
        }
    }

    /// Returns `true` if this value can be stored in an attribute of type `ty`.
    pub fn fits(&self, ty: &AttrType) -> bool {
        match (self, ty) {
            (AttrValue::Bool(_), AttrType::Bool) => true,
            (AttrValue::Int(_), AttrType::Int) => true,
            (AttrValue::Enum(v), AttrType::Enum(variants)) => (*v as usize) < variants.len(),
            (AttrValue::Str(_), AttrType::Str) => true,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<u8> {
        match self {
            AttrValue::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<Key> {
        match self {
            AttrValue::Str(k) => Some(*k),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Stored node
// ---------------------------------------------------------------------------

/// Container back-pointer: which node owns this one, through which edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parent {
    pub node: NodeId,
    pub edge: EdgeKind,
}

/// A node as stored in the arena.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    /// One value per attribute slot of the kind's layout.
    pub(crate) attrs: Vec<AttrValue>,
    /// One slot per edge slot of the kind's layout.
    pub(crate) edges: Vec<EdgeSlot>,
    pub(crate) parent: Option<Parent>,
}

// ---------------------------------------------------------------------------
// Borrowed view
// ---------------------------------------------------------------------------

/// Read-only view of one live node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    arena: &'a Arena,
    node: &'a Node,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(arena: &'a Arena, node: &'a Node) -> Self {
        NodeRef { arena, node }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind
    }

    pub fn kind_name(&self) -> &'static str {
        self.arena.schema().kind_name(self.node.kind)
    }

    /// Arena-qualified id, for operations that must reject foreign nodes.
    pub fn handle(&self) -> NodeHandle {
        self.arena.handle(self.node.id)
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Capability check against the schema.
    pub fn is_a(&self, kind: NodeKind) -> bool {
        self.arena.schema().is_a(self.node.kind, kind)
    }

    pub fn is_filtered(&self) -> bool {
        self.arena.is_filtered(self.node.id)
    }

    pub fn is_special(&self) -> bool {
        self.arena.schema().is_special(self.node.kind)
    }

    /// Container of this node, if any.
    pub fn parent(&self) -> Option<Parent> {
        self.node.parent
    }

    /// Value of `attr`, or `None` if the kind has no such attribute.
    pub fn attr(&self, attr: AttrId) -> Option<AttrValue> {
        let slot = self.arena.schema().layout(self.node.kind)?.attr_slot(attr)?;
        self.node.attrs.get(slot).copied()
    }

    pub fn bool_attr(&self, attr: AttrId) -> Option<bool> {
        self.attr(attr)?.as_bool()
    }

    pub fn int_attr(&self, attr: AttrId) -> Option<i32> {
        self.attr(attr)?.as_int()
    }

    pub fn enum_attr(&self, attr: AttrId) -> Option<u8> {
        self.attr(attr)?.as_enum()
    }

    /// Resolved text of a string attribute.
    pub fn str_attr(&self, attr: AttrId) -> Option<&'a str> {
        let key = self.attr(attr)?.as_key()?;
        self.arena.strings().get(key)
    }

    /// Attribute slots in layout order.
    pub fn attrs(&self) -> impl Iterator<Item = (AttrId, AttrValue)> + 'a {
        let node = self.node;
        self.arena
            .schema()
            .layout(node.kind)
            .map(|l| l.attrs.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
            .zip(node.attrs.iter().copied())
    }

    /// Every target of `edge`, filtered or not.
    pub fn raw_targets(&self, edge: EdgeKind) -> &'a [NodeId] {
        let node = self.node;
        self.arena
            .schema()
            .layout(node.kind)
            .and_then(|l| l.edge_slot(edge))
            .and_then(|slot| node.edges.get(slot))
            .map(EdgeSlot::targets)
            .unwrap_or(&[])
    }

    /// Targets of `edge` that are not filtered, in edge order.
    pub fn targets(&self, edge: EdgeKind) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let arena = self.arena;
        self.raw_targets(edge).iter().filter_map(move |&id| arena.get_visible(id))
    }

    /// The visible target of a single-valued edge.
    pub fn target(&self, edge: EdgeKind) -> Option<NodeRef<'a>> {
        self.targets(edge).next()
    }

    /// Edge slots in layout order, with every raw target.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKind, &'a [NodeId])> + 'a {
        let node = self.node;
        self.arena
            .schema()
            .layout(node.kind)
            .map(|l| l.edges.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
            .zip(node.edges.iter().map(EdgeSlot::targets))
    }

    /// `Named` capability view, if this node's kind carries the role.
    pub fn as_named(&self) -> Option<NamedView<'a>> {
        let role = self.arena.schema().named_role()?;
        if !self.is_a(role.kind) {
            return None;
        }
        Some(NamedView::new(*self, role))
    }

    /// `Positioned` capability view, if this node's kind carries the role.
    pub fn as_positioned(&self) -> Option<PositionedView<'a>> {
        let role = self.arena.schema().positioned_role()?;
        if !self.is_a(role.kind) {
            return None;
        }
        Some(PositionedView::new(*self, role))
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.node.id)
            .field("kind", &self.kind_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::python::{self, attr, edge, kind};

    #[test]
    fn default_values_per_type() {
        assert_eq!(AttrValue::default_for(&AttrType::Bool), AttrValue::Bool(false));
        assert_eq!(AttrValue::default_for(&AttrType::Str), AttrValue::Str(Key::EMPTY));
        assert_eq!(AttrValue::default_for(&AttrType::Enum(&["x"])), AttrValue::Enum(0));
    }

    #[test]
    fn enum_values_must_be_in_range() {
        let ty = AttrType::Enum(&["a", "b"]);
        assert!(AttrValue::Enum(1).fits(&ty));
        assert!(!AttrValue::Enum(2).fits(&ty));
        assert!(!AttrValue::Int(1).fits(&ty));
    }

    #[test]
    fn fresh_node_has_defaults_and_no_edges() {
        let mut arena = Arena::new(python::schema());
        let id = arena.create(kind::FUNCTION_DEF).unwrap();
        let node = arena.get(id).unwrap();
        assert_eq!(node.kind(), kind::FUNCTION_DEF);
        assert_eq!(node.bool_attr(attr::IS_ASYNC), Some(false));
        assert_eq!(node.str_attr(attr::NAME), Some(""));
        assert_eq!(node.int_attr(attr::NAME), None);
        assert!(node.edges().all(|(_, targets)| targets.is_empty()));
        assert!(node.parent().is_none());
        assert_eq!(node.attr(attr::INTEGER_VALUE), None);
    }

    #[test]
    fn targets_skip_filtered_nodes() {
        let mut arena = Arena::new(python::schema());
        let call = arena.create(kind::CALL).unwrap();
        let a = arena.create(kind::IDENTIFIER).unwrap();
        let b = arena.create(kind::IDENTIFIER).unwrap();
        arena.add_edge(call, edge::CALL_HAS_ARGUMENT, a).unwrap();
        arena.add_edge(call, edge::CALL_HAS_ARGUMENT, b).unwrap();
        arena.set_filtered(a, true).unwrap();

        let node = arena.get(call).unwrap();
        assert_eq!(node.raw_targets(edge::CALL_HAS_ARGUMENT), &[a, b]);
        let visible: Vec<_> = node.targets(edge::CALL_HAS_ARGUMENT).map(|n| n.id()).collect();
        assert_eq!(visible, vec![b]);
    }

    #[test]
    fn capability_views() {
        let mut arena = Arena::new(python::schema());
        let ident = arena.create(kind::IDENTIFIER).unwrap();
        let assign = arena.create(kind::ASSIGN).unwrap();
        assert!(arena.get(ident).unwrap().as_named().is_some());
        assert!(arena.get(assign).unwrap().as_named().is_none());
        assert!(arena.get(assign).unwrap().as_positioned().is_some());
    }
}
