//! The node arena ("factory").
//!
//! [`Arena`] owns every node of one graph, keyed by dense [`NodeId`]s that
//! start at 1 and are never reused. It is the single entry point for
//! creating, mutating, filtering and deleting nodes. Node storage is private,
//! so every edge mutation goes through the edge model and the reverse-edge
//! index (when enabled) can never drift from the forward edges.
//!
//! # Misuse
//!
//! Passing a node that belongs to another arena is reported as
//! [`AsgError::FactoryMismatch`] (subject node) or [`AsgError::CrossArena`]
//! (edge target). With [`ArenaConfig::panic_on_misuse`] set, which is the
//! default in debug builds, these also panic so the bug surfaces where it
//! happens.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::edge::EdgeSlot;
use crate::error::AsgError;
use crate::id::{ArenaId, AttrId, EdgeKind, Key, NodeHandle, NodeId, NodeKind};
use crate::node::{AttrValue, Node, NodeRef, Parent};
use crate::reverse::{ReverseEdges, Sources};
use crate::schema::Schema;
use crate::strtable::{KeyRemap, StringTable};
use crate::traversal::{Preorder, PreorderConfig};
use crate::visitor::Visitor;

/// Arena behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Panic on cross-arena misuse in addition to returning the error.
    pub panic_on_misuse: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            panic_on_misuse: cfg!(debug_assertions),
        }
    }
}

/// Anything that names a node: a bare id, an arena-qualified handle, or a
/// borrowed view.
///
/// Bare ids carry no owner and are trusted to belong to the arena they are
/// passed to.
pub trait NodeOperand {
    fn owner(&self) -> Option<ArenaId>;
    fn node_id(&self) -> NodeId;
}

impl NodeOperand for NodeId {
    fn owner(&self) -> Option<ArenaId> {
        None
    }

    fn node_id(&self) -> NodeId {
        *self
    }
}

impl NodeOperand for NodeHandle {
    fn owner(&self) -> Option<ArenaId> {
        Some(self.arena)
    }

    fn node_id(&self) -> NodeId {
        self.id
    }
}

impl NodeOperand for NodeRef<'_> {
    fn owner(&self) -> Option<ArenaId> {
        Some(self.arena().id())
    }

    fn node_id(&self) -> NodeId {
        self.id()
    }
}

/// Owner of all nodes of one graph.
#[derive(Debug)]
pub struct Arena {
    id: ArenaId,
    schema: Arc<Schema>,
    config: ArenaConfig,
    /// Indexed by `NodeId`. Slot 0 is never occupied.
    nodes: Vec<Option<Node>>,
    /// Soft-deletion flags, parallel to `nodes`.
    filtered: Vec<bool>,
    filter_enabled: bool,
    strings: StringTable,
    pub(crate) reverse: Option<ReverseEdges>,
    live: usize,
}

impl Arena {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, ArenaConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, config: ArenaConfig) -> Self {
        Arena {
            id: ArenaId::fresh(),
            schema,
            config,
            nodes: vec![None],
            filtered: vec![false],
            filter_enabled: true,
            strings: StringTable::new(),
            reverse: None,
            live: 0,
        }
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_arc(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Interns `text` in this arena's string table.
    pub fn intern(&mut self, text: &str) -> Key {
        self.strings.intern(text)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// One past the highest id ever handed out.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    /// Arena-qualified handle for `id`.
    pub fn handle(&self, id: NodeId) -> NodeHandle {
        NodeHandle { arena: self.id, id }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Allocates a node of a concrete kind with default attributes and no edges.
    pub fn create(&mut self, kind: NodeKind) -> Result<NodeId, AsgError> {
        let id = NodeId(self.nodes.len() as u32);
        let node = self.instantiate(id, kind)?;
        self.nodes.push(Some(node));
        self.filtered.push(false);
        self.live += 1;
        Ok(id)
    }

    /// Allocates a node under a caller-chosen id, used when restoring a saved
    /// graph. The id must be above every id handed out so far.
    pub fn create_with_id(&mut self, id: NodeId, kind: NodeKind) -> Result<NodeId, AsgError> {
        if id.is_none() {
            return Err(AsgError::CorruptGraph {
                reason: "node id 0 is reserved".into(),
            });
        }
        if id.index() < self.nodes.len() {
            return Err(AsgError::NodeExists { id });
        }
        let node = self.instantiate(id, kind)?;
        let grow = id.index() + 1 - self.nodes.len();
        self.nodes
            .try_reserve(grow)
            .and_then(|()| self.filtered.try_reserve(grow))
            .map_err(|_| AsgError::CorruptGraph {
                reason: format!("cannot allocate {grow} node slots for node {id}"),
            })?;
        self.nodes.resize_with(id.index(), || None);
        self.filtered.resize(id.index(), false);
        self.nodes.push(Some(node));
        self.filtered.push(false);
        self.live += 1;
        Ok(id)
    }

    fn instantiate(&self, id: NodeId, kind: NodeKind) -> Result<Node, AsgError> {
        let def = self.schema.kind(kind).ok_or(AsgError::UnknownKind { kind })?;
        if def.is_abstract {
            return Err(AsgError::AbstractKind { name: def.name });
        }
        let layout = self.schema.layout(kind).ok_or(AsgError::UnknownKind { kind })?;
        let attrs = layout
            .attrs
            .iter()
            .filter_map(|&a| self.schema.attr(a))
            .map(|a| AttrValue::default_for(&a.ty))
            .collect();
        let edges = layout
            .edges
            .iter()
            .filter_map(|&e| self.schema.edge(e))
            .map(|e| EdgeSlot::empty(e.shape))
            .collect();
        Ok(Node {
            id,
            kind,
            attrs,
            edges,
            parent: None,
        })
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// Looks up a live node, filtered or not. Foreign handles resolve to `None`.
    pub fn get(&self, node: impl NodeOperand) -> Option<NodeRef<'_>> {
        if node.owner().is_some_and(|a| a != self.id) {
            return None;
        }
        self.node(node.node_id()).map(|n| NodeRef::new(self, n))
    }

    /// Looks up a live node that is not filtered.
    pub fn get_visible(&self, id: NodeId) -> Option<NodeRef<'_>> {
        if self.is_filtered(id) {
            return None;
        }
        self.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind_of(&self, id: NodeId) -> Result<NodeKind, AsgError> {
        self.node(id).map(|n| n.kind).ok_or(AsgError::NodeNotFound { id })
    }

    /// Container of `id` and the containment edge holding it.
    pub fn parent(&self, id: NodeId) -> Option<Parent> {
        self.node(id)?.parent
    }

    /// Every live node in id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.nodes.iter().flatten().map(move |n| NodeRef::new(self, n))
    }

    /// Live, unfiltered nodes in id order.
    pub fn visible_nodes(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.nodes().filter(|n| !n.is_filtered())
    }

    /// Live non-special nodes without a container, in id order.
    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.nodes().filter(|n| n.parent().is_none() && !n.is_special())
    }

    /// Total number of forward edges.
    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .map(|n| n.edges.iter().map(EdgeSlot::len).sum::<usize>())
            .sum()
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())?.as_ref()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())?.as_mut()
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    /// Sets an attribute, checking that the kind declares it and the value
    /// has the declared type.
    pub fn set_attr(&mut self, node: impl NodeOperand, attr: AttrId, value: AttrValue) -> Result<(), AsgError> {
        let id = self.resolve_subject(node)?;
        let slot = self.attr_slot_checked(id, attr, &value)?;
        if let AttrValue::Str(key) = value {
            if !key.is_empty() && !self.strings.contains(key) {
                return Err(AsgError::UnknownKey { key });
            }
        }
        if let Some(n) = self.node_mut(id) {
            n.attrs[slot] = value;
        }
        Ok(())
    }

    /// Interns `text` and stores it in a string attribute.
    pub fn set_str(&mut self, node: impl NodeOperand, attr: AttrId, text: &str) -> Result<(), AsgError> {
        let id = self.resolve_subject(node)?;
        let placeholder = AttrValue::Str(Key::EMPTY);
        let slot = self.attr_slot_checked(id, attr, &placeholder)?;
        let key = self.strings.intern(text);
        if let Some(n) = self.node_mut(id) {
            n.attrs[slot] = AttrValue::Str(key);
        }
        Ok(())
    }

    fn attr_slot_checked(&self, id: NodeId, attr: AttrId, value: &AttrValue) -> Result<usize, AsgError> {
        let kind = self.kind_of(id)?;
        let slot = self
            .schema
            .layout(kind)
            .and_then(|l| l.attr_slot(attr))
            .ok_or(AsgError::UnknownAttribute { kind, attr })?;
        if let Some(def) = self.schema.attr(attr) {
            if !value.fits(&def.ty) {
                return Err(AsgError::AttributeType {
                    name: def.name,
                    expected: def.ty.name(),
                });
            }
        }
        Ok(slot)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Deletes one node.
    ///
    /// Every edge pointing at the node is removed first (through the reverse
    /// index when enabled, otherwise by scanning), then every edge it owns,
    /// and only then is the slot reclaimed. Children lose their container but
    /// stay alive.
    pub fn delete(&mut self, node: impl NodeOperand) -> Result<(), AsgError> {
        let id = self.resolve_subject(node)?;

        let incoming: Vec<(NodeId, EdgeKind)> = match &self.reverse {
            Some(reverse) => reverse.incoming(id).map(|(edge, source)| (source, edge)).collect(),
            None => self.scan_incoming(id),
        };
        for (source, edge) in incoming {
            let containment = self.schema.edge(edge).is_some_and(|d| d.is_containment());
            let Some(slot) = self.edge_slot_of(source, edge) else {
                continue;
            };
            while self.slot_mut(source, slot).is_some_and(|s| s.remove_first(id)) {
                self.unlink(source, edge, id, containment);
            }
        }

        let outgoing: Vec<(EdgeKind, Vec<NodeId>)> = match self.get(id) {
            Some(n) => n.edges().map(|(edge, targets)| (edge, targets.to_vec())).collect(),
            None => Vec::new(),
        };
        for (edge, targets) in outgoing {
            let containment = self.schema.edge(edge).is_some_and(|d| d.is_containment());
            for target in targets {
                self.unlink(id, edge, target, containment);
            }
        }

        if let Some(reverse) = self.reverse.as_mut() {
            reverse.forget(id);
        }
        self.nodes[id.index()] = None;
        self.filtered[id.index()] = false;
        self.live -= 1;
        tracing::debug!(node = %id, "deleted node");
        Ok(())
    }

    /// Deletes `node` and its whole containment subtree, filtered nodes
    /// included. Returns the number of deleted nodes.
    pub fn delete_subtree(&mut self, node: impl NodeOperand) -> Result<usize, AsgError> {
        let root = self.resolve_subject(node)?;
        let ids = self.collect_subtree(root);
        for &id in ids.iter().rev() {
            self.delete(id)?;
        }
        tracing::debug!(root = %root, count = ids.len(), "deleted subtree");
        Ok(ids.len())
    }

    fn scan_incoming(&self, target: NodeId) -> Vec<(NodeId, EdgeKind)> {
        let mut found = Vec::new();
        for node in self.nodes() {
            for (edge, targets) in node.edges() {
                if targets.contains(&target) {
                    found.push((node.id(), edge));
                }
            }
        }
        found
    }

    fn edge_slot_of(&self, node: NodeId, edge: EdgeKind) -> Option<usize> {
        let kind = self.node(node)?.kind;
        self.schema.layout(kind)?.edge_slot(edge)
    }

    /// Ids of the containment subtree under `root`, in preorder.
    fn collect_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut collector = SubtreeCollector::default();
        let config = PreorderConfig {
            safe_mode: true,
            visit_filtered_edges: true,
            visit_special_nodes: false,
            ..PreorderConfig::default()
        };
        {
            let mut preorder = Preorder::new(config);
            preorder.add_visitor(&mut collector);
            preorder.run_from(self, root);
        }
        collector.ids
    }

    // -----------------------------------------------------------------------
    // Filtering
    // -----------------------------------------------------------------------

    /// Whether `id` is currently hidden. Always `false` while filtering is
    /// disabled.
    pub fn is_filtered(&self, id: NodeId) -> bool {
        self.filter_enabled && self.filtered.get(id.index()).copied().unwrap_or(false)
    }

    pub fn set_filtered(&mut self, node: impl NodeOperand, filtered: bool) -> Result<(), AsgError> {
        let id = self.resolve_subject(node)?;
        self.filtered[id.index()] = filtered;
        Ok(())
    }

    /// Filters `node` and its containment subtree. Returns the number of
    /// affected nodes.
    pub fn filter_subtree(&mut self, node: impl NodeOperand) -> Result<usize, AsgError> {
        let root = self.resolve_subject(node)?;
        let ids = self.collect_subtree(root);
        for &id in &ids {
            self.filtered[id.index()] = true;
        }
        Ok(ids.len())
    }

    /// Unfilters `node`, its subtree, and its ancestors so the node becomes
    /// reachable again.
    pub fn unfilter_subtree(&mut self, node: impl NodeOperand) -> Result<usize, AsgError> {
        let root = self.resolve_subject(node)?;
        let ids = self.collect_subtree(root);
        for &id in &ids {
            self.filtered[id.index()] = false;
        }
        let mut current = self.parent(root);
        while let Some(parent) = current {
            self.filtered[parent.node.index()] = false;
            current = self.parent(parent.node);
        }
        Ok(ids.len())
    }

    /// Turns filtering on or off. While off, every accessor behaves as if
    /// no node were filtered; the flags themselves are kept.
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.filter_enabled = enabled;
    }

    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    /// Raw filter flags, one per id slot.
    pub fn filter_state(&self) -> &[bool] {
        &self.filtered
    }

    /// Replaces the filter flags. `state` must have one entry per id slot.
    pub fn load_filter_state(&mut self, state: &[bool]) -> Result<(), AsgError> {
        if state.len() != self.filtered.len() {
            return Err(AsgError::CorruptGraph {
                reason: format!(
                    "filter covers {} nodes, graph has {}",
                    state.len(),
                    self.filtered.len()
                ),
            });
        }
        for (i, (&flag, slot)) in state.iter().zip(self.filtered.iter_mut()).enumerate() {
            *slot = flag && self.nodes[i].is_some();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // String table
    // -----------------------------------------------------------------------

    /// Re-keys every string attribute into `table` and makes it this arena's
    /// table. Returns the previous table and the old→new key mapping.
    pub fn swap_string_table(&mut self, table: StringTable) -> (StringTable, KeyRemap) {
        let old = std::mem::replace(&mut self.strings, table);
        let mut remap = KeyRemap::new();
        for node in self.nodes.iter_mut().flatten() {
            for value in node.attrs.iter_mut() {
                if let AttrValue::Str(key) = value {
                    if let Some(new_key) = old.transfer(*key, &mut self.strings, &mut remap) {
                        *key = new_key;
                    }
                }
            }
        }
        tracing::debug!(remapped = remap.len(), "swapped string table");
        (old, remap)
    }

    /// Flags exactly the strings referenced by live nodes for saving.
    pub fn mark_referenced_strings(&mut self) {
        self.strings.clear_save_marks();
        for node in self.nodes.iter().flatten() {
            for value in &node.attrs {
                if let AttrValue::Str(key) = value {
                    self.strings.mark_for_save(*key);
                }
            }
        }
    }

    /// Restores a saved string, keeping its key when possible.
    pub fn restore_string(&mut self, key: Key, text: &str, remap: &mut KeyRemap) -> Key {
        self.strings.restore(key, text, remap)
    }

    // -----------------------------------------------------------------------
    // Reverse edges
    // -----------------------------------------------------------------------

    /// Builds the reverse-edge index if it does not exist yet.
    pub fn enable_reverse_edges(&mut self) {
        if self.reverse.is_none() {
            self.reverse = Some(ReverseEdges::build(self));
        }
    }

    /// Drops the reverse-edge index.
    pub fn disable_reverse_edges(&mut self) {
        if self.reverse.take().is_some() {
            tracing::debug!("dropped reverse-edge index");
        }
    }

    pub fn reverse_edges_enabled(&self) -> bool {
        self.reverse.is_some()
    }

    pub fn reverse_edges(&self) -> Result<&ReverseEdges, AsgError> {
        self.reverse.as_ref().ok_or(AsgError::ReverseEdgesDisabled)
    }

    /// Sources whose `edge` points at `target`.
    pub fn reverse_sources(&self, target: NodeId, edge: EdgeKind) -> Result<Sources<'_>, AsgError> {
        Ok(self.reverse_edges()?.sources(target, edge))
    }

    // -----------------------------------------------------------------------
    // Operand resolution
    // -----------------------------------------------------------------------

    /// Resolves the node an operation acts on.
    pub(crate) fn resolve_subject(&self, node: impl NodeOperand) -> Result<NodeId, AsgError> {
        if let Some(owner) = node.owner() {
            if owner != self.id {
                return Err(self.misuse(AsgError::FactoryMismatch {
                    expected: self.id,
                    found: owner,
                }));
            }
        }
        let id = node.node_id();
        if self.node(id).is_none() {
            return Err(AsgError::NodeNotFound { id });
        }
        Ok(id)
    }

    /// Resolves an edge target.
    pub(crate) fn resolve_target(&self, node: impl NodeOperand) -> Result<NodeId, AsgError> {
        if let Some(owner) = node.owner() {
            if owner != self.id {
                return Err(self.misuse(AsgError::CrossArena {
                    expected: self.id,
                    found: owner,
                }));
            }
        }
        let id = node.node_id();
        if self.node(id).is_none() {
            return Err(AsgError::DanglingReference { id });
        }
        Ok(id)
    }

    pub(crate) fn misuse(&self, err: AsgError) -> AsgError {
        if self.config.panic_on_misuse {
            panic!("arena misuse: {err}");
        }
        err
    }
}

#[derive(Default)]
struct SubtreeCollector {
    ids: Vec<NodeId>,
}

impl Visitor for SubtreeCollector {
    fn visit(&mut self, node: NodeRef<'_>) {
        self.ids.push(node.id());
    }
}
