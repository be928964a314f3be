//! In-memory abstract semantic graph store.
//!
//! An [`Arena`] owns typed nodes described by a [`Schema`]: attributes,
//! single- and multi-valued edges, containment back-pointers, soft-deletion
//! filtering and an optional reverse-edge index. [`Preorder`] walks the
//! containment forest and drives [`Visitor`]s.

pub mod arena;
pub mod capability;
pub mod catalog;
pub mod edge;
pub mod error;
pub mod id;
pub mod node;
pub mod reverse;
pub mod schema;
pub mod strtable;
pub mod traversal;
pub mod visitor;

// Re-export commonly used types
pub use arena::{Arena, ArenaConfig, NodeOperand};
pub use capability::{Named, NamedView, Positioned, PositionedView, SourceRange};
pub use edge::EdgeSlot;
pub use error::{AsgError, SchemaError};
pub use id::{ArenaId, AttrId, EdgeKind, Key, NodeHandle, NodeId, NodeKind};
pub use node::{AttrValue, NodeRef, Parent};
pub use reverse::{ReverseEdges, Sources};
pub use schema::{AttrDef, AttrType, EdgeDef, EdgeRole, EdgeShape, KindDef, Layout, Schema, SchemaBuilder};
pub use strtable::{KeyRemap, StringTable};
pub use traversal::{traverse, Preorder, PreorderConfig, RunOutcome, RunSummary};
pub use visitor::{DispatchBuilder, DispatchTable, Dispatcher, Visitor};
