//! Stable ID newtypes for graph entities.
//!
//! All IDs are distinct newtype wrappers over small unsigned integers, so a
//! `NodeId` cannot be accidentally used where an `EdgeKind` or a string
//! [`Key`] is expected. `NodeId(0)` and `Key(0)` are reserved: the former is
//! the on-disk "no target" sentinel, the latter is the key of the empty string.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Dense node identifier, unique within one [`Arena`](crate::arena::Arena).
///
/// Ids are handed out by the arena starting at 1 and are never reused within
/// one arena instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Node kind tag. Indexes the schema's kind table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKind(pub u16);

/// Edge kind tag. Every edge kind is declared by exactly one node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKind(pub u16);

/// Attribute tag. Every attribute is declared by exactly one node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttrId(pub u16);

/// Interned string key handed out by a [`StringTable`](crate::strtable::StringTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(pub u32);

/// Identity of one arena instance within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaId(u32);

/// A node id qualified by the arena that owns it.
///
/// Passing a handle (rather than a bare [`NodeId`]) to an arena operation
/// lets the arena reject nodes that belong to another arena instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub arena: ArenaId,
    pub id: NodeId,
}

impl NodeId {
    /// The "no node" sentinel used by the binary format.
    pub const NONE: NodeId = NodeId(0);

    /// Returns `true` for the reserved sentinel id.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Slot index inside the arena's node vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Key {
    /// Key of the empty string. Never stored in a table.
    pub const EMPTY: Key = Key(0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl NodeKind {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeKind {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl AttrId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

impl ArenaId {
    /// Allocates a process-unique arena identity.
    pub(crate) fn fresh() -> Self {
        ArenaId(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena#{}", self.0)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.arena, self.id)
    }
}
