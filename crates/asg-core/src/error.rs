//! Core error types for asg-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Every failure
//! is local and recoverable: mutating operations validate fully before they
//! touch the graph, so an `Err` always means "nothing changed".

use thiserror::Error;

use crate::id::{ArenaId, AttrId, EdgeKind, Key, NodeId, NodeKind};

/// Errors produced by arena, edge, and index operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsgError {
    /// An edge target id does not name a live node.
    #[error("dangling reference: node {id} does not exist")]
    DanglingReference { id: NodeId },

    /// An edge target belongs to a different arena than the edge source.
    #[error("cross-arena edge: target belongs to {found}, expected {expected}")]
    CrossArena { expected: ArenaId, found: ArenaId },

    /// The target's kind does not provide the capability the edge expects.
    #[error("invalid target for edge {edge}: node {target} has kind {found}, expected kind {expected}")]
    InvalidTarget {
        edge: EdgeKind,
        target: NodeId,
        found: NodeKind,
        expected: NodeKind,
    },

    /// Removal of an edge that is not present.
    #[error("edge not found: {from} -[{edge}]-> {target}")]
    EdgeNotFound {
        from: NodeId,
        edge: EdgeKind,
        target: NodeId,
    },

    /// Structurally impossible data was detected while restoring a graph.
    #[error("corrupt graph: {reason}")]
    CorruptGraph { reason: String },

    /// A node was passed to an arena that does not own it.
    #[error("factory mismatch: node is owned by {found}, operation runs on {expected}")]
    FactoryMismatch { expected: ArenaId, found: ArenaId },

    /// The operation's subject node does not exist (never allocated or deleted).
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// The kind tag is not part of the arena's schema.
    #[error("unknown node kind: {kind}")]
    UnknownKind { kind: NodeKind },

    /// Abstract kinds describe capabilities and cannot be instantiated.
    #[error("cannot create a node of abstract kind '{name}'")]
    AbstractKind { name: &'static str },

    /// The edge kind is not part of the source node's layout.
    #[error("edge {edge} is not declared for node kind {kind}")]
    UnknownEdge { kind: NodeKind, edge: EdgeKind },

    /// `set_edge` on a multi-valued edge, or `add_edge` on a single-valued one.
    #[error("edge {edge} is {actual}-valued")]
    EdgeShapeMismatch { edge: EdgeKind, actual: &'static str },

    /// The attribute is not part of the node's layout.
    #[error("attribute {attr} is not declared for node kind {kind}")]
    UnknownAttribute { kind: NodeKind, attr: AttrId },

    /// The attribute value does not have the declared type.
    #[error("attribute '{name}' expects a {expected} value")]
    AttributeType {
        name: &'static str,
        expected: &'static str,
    },

    /// A string key that the arena's string table does not know.
    #[error("string key {key} is not in the string table")]
    UnknownKey { key: Key },

    /// Setting the containment edge would make a node contain one of its ancestors.
    #[error("containment cycle: node {target} is an ancestor of {from}")]
    ContainmentCycle { from: NodeId, target: NodeId },

    /// A reverse-edge query was issued while the index does not exist.
    #[error("reverse edges are not enabled for this arena")]
    ReverseEdgesDisabled,

    /// A loader tried to restore a node into an occupied id slot.
    #[error("node id {id} is already in use")]
    NodeExists { id: NodeId },
}

/// Errors raised while building a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Kinds, edges, and attributes must be declared with dense ids in order.
    #[error("{what} '{name}' declared with id {found}, expected {expected}")]
    OutOfOrder {
        what: &'static str,
        name: &'static str,
        expected: u16,
        found: u16,
    },

    /// A declaration refers to a kind that was never declared.
    #[error("{what} '{name}' refers to unknown kind {kind}")]
    UnknownKind {
        what: &'static str,
        name: &'static str,
        kind: NodeKind,
    },

    /// The base graph of the kind hierarchy contains a cycle.
    #[error("kind hierarchy contains a cycle through '{name}'")]
    BaseCycle { name: &'static str },

    /// Two attributes or edges with the same name end up in one layout.
    #[error("duplicate member '{member}' in layout of kind '{kind}'")]
    DuplicateMember {
        kind: &'static str,
        member: &'static str,
    },

    /// A role binding points at an attribute of the wrong type.
    #[error("role '{role}' requires attribute '{attr}' to be {expected}")]
    RoleAttribute {
        role: &'static str,
        attr: &'static str,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_reference_message() {
        let err = AsgError::DanglingReference { id: NodeId(42) };
        insta::assert_snapshot!(err.to_string(), @"dangling reference: node 42 does not exist");
    }

    #[test]
    fn edge_not_found_message() {
        let err = AsgError::EdgeNotFound {
            from: NodeId(1),
            edge: EdgeKind(3),
            target: NodeId(9),
        };
        insta::assert_snapshot!(err.to_string(), @"edge not found: 1 -[3]-> 9");
    }

    #[test]
    fn schema_error_message() {
        let err = SchemaError::OutOfOrder {
            what: "kind",
            name: "Assign",
            expected: 4,
            found: 6,
        };
        insta::assert_snapshot!(err.to_string(), @"kind 'Assign' declared with id 6, expected 4");
    }
}
