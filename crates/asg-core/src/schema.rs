//! Node-kind catalogue metadata.
//!
//! A [`Schema`] is the static description of one language's node kinds:
//! which kinds exist, how they inherit from each other, which attributes and
//! edges each kind declares, and which abstract kinds carry the well-known
//! `Named` / `Positioned` roles. It is assembled once with a
//! [`SchemaBuilder`], validated, and then shared immutably (`Arc<Schema>`) by
//! every arena built on it.
//!
//! # Layouts
//!
//! For every kind the schema precomputes a [`Layout`]: the linearised
//! ancestor chain (each ancestor exactly once, bases before derived kinds,
//! declaration order among siblings) and the attribute and edge slots
//! flattened along that chain. Node storage, the binary codec, traversal and
//! hashing all iterate the layout, so base fields always come first and are
//! never duplicated or skipped.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::SchemaError;
use crate::id::{AttrId, EdgeKind, NodeKind};

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Bool,
    /// Signed 32-bit integer.
    Int,
    /// One of a fixed list of named variants, stored as the variant index.
    Enum(&'static [&'static str]),
    /// Interned string, stored as a string-table key.
    Str,
}

impl AttrType {
    pub fn name(&self) -> &'static str {
        match self {
            AttrType::Bool => "bool",
            AttrType::Int => "int",
            AttrType::Enum(_) => "enum",
            AttrType::Str => "string",
        }
    }
}

/// Whether an edge holds one optional target or an ordered list of targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeShape {
    Single,
    Multi,
}

/// Ownership semantics of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRole {
    /// The source owns the target; a target has at most one container.
    Containment,
    /// Plain reference, no ownership.
    Reference,
}

#[derive(Debug, Clone)]
pub struct KindDef {
    pub id: NodeKind,
    pub name: &'static str,
    /// Direct bases in declaration order.
    pub bases: Vec<NodeKind>,
    pub is_abstract: bool,
    /// Out-of-tree shared node (types, comments, symbol objects).
    pub special: bool,
    /// Attributes declared by this kind itself.
    pub attrs: Vec<AttrId>,
    /// Edges declared by this kind itself.
    pub edges: Vec<EdgeKind>,
}

#[derive(Debug, Clone)]
pub struct AttrDef {
    pub id: AttrId,
    pub name: &'static str,
    pub owner: NodeKind,
    pub ty: AttrType,
    /// Participates in node similarity. Positional attributes never do.
    pub in_similarity: bool,
}

#[derive(Debug, Clone)]
pub struct EdgeDef {
    pub id: EdgeKind,
    pub name: &'static str,
    pub owner: NodeKind,
    pub shape: EdgeShape,
    pub role: EdgeRole,
    /// Kind (or capability) every target must satisfy.
    pub target: NodeKind,
}

impl EdgeDef {
    pub fn is_containment(&self) -> bool {
        self.role == EdgeRole::Containment
    }

    pub fn is_multi(&self) -> bool {
        self.shape == EdgeShape::Multi
    }
}

/// Binding of the `Named` role to an abstract kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedRole {
    pub kind: NodeKind,
    pub name: AttrId,
}

/// Binding of the `Positioned` role to an abstract kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionedRole {
    pub kind: NodeKind,
    pub path: AttrId,
    pub line: AttrId,
    pub col: AttrId,
    pub end_line: AttrId,
    pub end_col: AttrId,
}

/// Precomputed per-kind storage layout.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Linearised ancestors, ending with the kind itself.
    pub ancestors: Vec<NodeKind>,
    /// Flattened attribute slots.
    pub attrs: Vec<AttrId>,
    /// Flattened edge slots.
    pub edges: Vec<EdgeKind>,
    attr_slots: Vec<Option<u16>>,
    edge_slots: Vec<Option<u16>>,
    is_a: Vec<bool>,
}

impl Layout {
    /// Slot of `attr` in this layout, if the kind has it.
    pub fn attr_slot(&self, attr: AttrId) -> Option<usize> {
        self.attr_slots.get(attr.index()).copied().flatten().map(usize::from)
    }

    /// Slot of `edge` in this layout, if the kind has it.
    pub fn edge_slot(&self, edge: EdgeKind) -> Option<usize> {
        self.edge_slots.get(edge.index()).copied().flatten().map(usize::from)
    }

    pub fn is_a(&self, ancestor: NodeKind) -> bool {
        self.is_a.get(ancestor.index()).copied().unwrap_or(false)
    }
}

/// Validated, immutable node-kind catalogue.
#[derive(Debug, Clone)]
pub struct Schema {
    name: &'static str,
    version: u32,
    kinds: Vec<KindDef>,
    attrs: Vec<AttrDef>,
    edges: Vec<EdgeDef>,
    layouts: Vec<Layout>,
    kind_names: HashMap<&'static str, NodeKind>,
    named: Option<NamedRole>,
    positioned: Option<PositionedRole>,
}

impl Schema {
    /// Catalogue name, written into saved file headers.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Catalogue version, written into saved file headers.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn kind(&self, kind: NodeKind) -> Option<&KindDef> {
        self.kinds.get(kind.index())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindDef> + '_ {
        self.kinds.iter()
    }

    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn kind_by_name(&self, name: &str) -> Option<NodeKind> {
        self.kind_names.get(name).copied()
    }

    /// Name of `kind`, or `"?"` for a kind outside the schema.
    pub fn kind_name(&self, kind: NodeKind) -> &'static str {
        self.kind(kind).map(|k| k.name).unwrap_or("?")
    }

    pub fn attr(&self, attr: AttrId) -> Option<&AttrDef> {
        self.attrs.get(attr.index())
    }

    pub fn attrs(&self) -> impl Iterator<Item = &AttrDef> + '_ {
        self.attrs.iter()
    }

    pub fn edge(&self, edge: EdgeKind) -> Option<&EdgeDef> {
        self.edges.get(edge.index())
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeDef> + '_ {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Name of `edge`, or `"?"` for an edge outside the schema.
    pub fn edge_name(&self, edge: EdgeKind) -> &'static str {
        self.edge(edge).map(|e| e.name).unwrap_or("?")
    }

    /// Finds an edge by name in the layout of `kind`.
    pub fn edge_by_name(&self, kind: NodeKind, name: &str) -> Option<EdgeKind> {
        self.layout(kind)?
            .edges
            .iter()
            .copied()
            .find(|e| self.edges[e.index()].name == name)
    }

    /// Finds an attribute by name in the layout of `kind`.
    pub fn attr_by_name(&self, kind: NodeKind, name: &str) -> Option<AttrId> {
        self.layout(kind)?
            .attrs
            .iter()
            .copied()
            .find(|a| self.attrs[a.index()].name == name)
    }

    pub fn layout(&self, kind: NodeKind) -> Option<&Layout> {
        self.layouts.get(kind.index())
    }

    /// Capability check: does `kind` derive from (or equal) `ancestor`?
    pub fn is_a(&self, kind: NodeKind, ancestor: NodeKind) -> bool {
        self.layout(kind).is_some_and(|l| l.is_a(ancestor))
    }

    pub fn is_special(&self, kind: NodeKind) -> bool {
        self.kind(kind).is_some_and(|k| k.special)
    }

    pub fn named_role(&self) -> Option<NamedRole> {
        self.named
    }

    pub fn positioned_role(&self) -> Option<PositionedRole> {
        self.positioned
    }
}

/// Incremental builder for a [`Schema`].
///
/// Kinds, attributes and edges must be declared with dense ids in ascending
/// order starting at 0. Declarations record their first problem and
/// [`build`](SchemaBuilder::build) reports it, so catalogue code can declare
/// everything without threading `?` through every line.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: &'static str,
    version: u32,
    kinds: Vec<KindDef>,
    attrs: Vec<AttrDef>,
    edges: Vec<EdgeDef>,
    named: Option<NamedRole>,
    positioned: Option<PositionedRole>,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    pub fn new(name: &'static str, version: u32) -> Self {
        SchemaBuilder {
            name,
            version,
            kinds: Vec::new(),
            attrs: Vec::new(),
            edges: Vec::new(),
            named: None,
            positioned: None,
            error: None,
        }
    }

    /// Declares an abstract kind (a capability).
    pub fn abstract_kind(&mut self, id: NodeKind, name: &'static str, bases: &[NodeKind]) -> &mut Self {
        self.push_kind(id, name, bases, true, false)
    }

    /// Declares an instantiable kind.
    pub fn concrete_kind(&mut self, id: NodeKind, name: &'static str, bases: &[NodeKind]) -> &mut Self {
        self.push_kind(id, name, bases, false, false)
    }

    /// Declares an instantiable out-of-tree kind.
    pub fn special_kind(&mut self, id: NodeKind, name: &'static str, bases: &[NodeKind]) -> &mut Self {
        self.push_kind(id, name, bases, false, true)
    }

    /// Declares an attribute on `owner`.
    pub fn attr(&mut self, id: AttrId, owner: NodeKind, name: &'static str, ty: AttrType) -> &mut Self {
        if self.check_order("attribute", name, self.attrs.len(), id.0) {
            if self.check_known("attribute", name, owner) {
                self.kinds[owner.index()].attrs.push(id);
            }
            self.attrs.push(AttrDef {
                id,
                name,
                owner,
                ty,
                in_similarity: true,
            });
        }
        self
    }

    /// Declares an edge on `owner`.
    pub fn edge(
        &mut self,
        id: EdgeKind,
        owner: NodeKind,
        name: &'static str,
        shape: EdgeShape,
        role: EdgeRole,
        target: NodeKind,
    ) -> &mut Self {
        if self.check_order("edge", name, self.edges.len(), id.0) {
            if self.check_known("edge", name, owner) {
                self.kinds[owner.index()].edges.push(id);
            }
            self.edges.push(EdgeDef {
                id,
                name,
                owner,
                shape,
                role,
                target,
            });
        }
        self
    }

    /// Binds the `Named` role to `kind`, using `name` as the name attribute.
    pub fn bind_named(&mut self, kind: NodeKind, name: AttrId) -> &mut Self {
        if self.check_role("Named", name, AttrType::Str) {
            self.named = Some(NamedRole { kind, name });
        }
        self
    }

    /// Binds the `Positioned` role. Positional attributes are excluded from
    /// similarity.
    pub fn bind_positioned(&mut self, role: PositionedRole) -> &mut Self {
        let ok = self.check_role("Positioned", role.path, AttrType::Str)
            && [role.line, role.col, role.end_line, role.end_col]
                .iter()
                .all(|&a| self.check_role("Positioned", a, AttrType::Int));
        if ok {
            for attr in [role.path, role.line, role.col, role.end_line, role.end_col] {
                self.attrs[attr.index()].in_similarity = false;
            }
            self.positioned = Some(role);
        }
        self
    }

    /// Validates the declarations and computes all layouts.
    pub fn build(&mut self) -> Result<Schema, SchemaError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let kind_count = self.kinds.len();

        for kind in &self.kinds {
            for &base in &kind.bases {
                if base.index() >= kind_count {
                    return Err(SchemaError::UnknownKind {
                        what: "kind",
                        name: kind.name,
                        kind: base,
                    });
                }
            }
        }
        for edge in &self.edges {
            if edge.target.index() >= kind_count {
                return Err(SchemaError::UnknownKind {
                    what: "edge",
                    name: edge.name,
                    kind: edge.target,
                });
            }
        }

        // Bases may be declared after the kinds that use them, so cycles are
        // possible and must be rejected before linearising.
        let mut hierarchy = DiGraph::<(), ()>::with_capacity(kind_count, kind_count);
        for _ in 0..kind_count {
            hierarchy.add_node(());
        }
        for kind in &self.kinds {
            for &base in &kind.bases {
                hierarchy.add_edge(NodeIndex::new(base.index()), NodeIndex::new(kind.id.index()), ());
            }
        }
        if let Err(cycle) = toposort(&hierarchy, None) {
            return Err(SchemaError::BaseCycle {
                name: self.kinds[cycle.node_id().index()].name,
            });
        }

        let mut layouts = Vec::with_capacity(kind_count);
        for kind in &self.kinds {
            layouts.push(self.layout_for(kind.id)?);
        }

        let kind_names = self.kinds.iter().map(|k| (k.name, k.id)).collect();

        Ok(Schema {
            name: self.name,
            version: self.version,
            kinds: std::mem::take(&mut self.kinds),
            attrs: std::mem::take(&mut self.attrs),
            edges: std::mem::take(&mut self.edges),
            layouts,
            kind_names,
            named: self.named,
            positioned: self.positioned,
        })
    }

    fn layout_for(&self, kind: NodeKind) -> Result<Layout, SchemaError> {
        let mut ancestors = Vec::new();
        let mut seen = vec![false; self.kinds.len()];
        self.linearise(kind, &mut seen, &mut ancestors);

        let mut attrs = Vec::new();
        let mut edges = Vec::new();
        let mut attr_slots = vec![None; self.attrs.len()];
        let mut edge_slots = vec![None; self.edges.len()];
        let mut attr_names: HashMap<&'static str, ()> = HashMap::new();
        let mut edge_names: HashMap<&'static str, ()> = HashMap::new();
        let kind_name = self.kinds[kind.index()].name;

        for &ancestor in &ancestors {
            let def = &self.kinds[ancestor.index()];
            for &attr in &def.attrs {
                let name = self.attrs[attr.index()].name;
                if attr_names.insert(name, ()).is_some() {
                    return Err(SchemaError::DuplicateMember { kind: kind_name, member: name });
                }
                attr_slots[attr.index()] = Some(attrs.len() as u16);
                attrs.push(attr);
            }
            for &edge in &def.edges {
                let name = self.edges[edge.index()].name;
                if edge_names.insert(name, ()).is_some() {
                    return Err(SchemaError::DuplicateMember { kind: kind_name, member: name });
                }
                edge_slots[edge.index()] = Some(edges.len() as u16);
                edges.push(edge);
            }
        }

        let mut is_a = vec![false; self.kinds.len()];
        for &ancestor in &ancestors {
            is_a[ancestor.index()] = true;
        }

        Ok(Layout {
            ancestors,
            attrs,
            edges,
            attr_slots,
            edge_slots,
            is_a,
        })
    }

    /// Depth-first over bases, bases before self, each kind once.
    fn linearise(&self, kind: NodeKind, seen: &mut [bool], out: &mut Vec<NodeKind>) {
        if seen[kind.index()] {
            return;
        }
        seen[kind.index()] = true;
        for &base in &self.kinds[kind.index()].bases {
            self.linearise(base, seen, out);
        }
        out.push(kind);
    }

    fn push_kind(
        &mut self,
        id: NodeKind,
        name: &'static str,
        bases: &[NodeKind],
        is_abstract: bool,
        special: bool,
    ) -> &mut Self {
        if self.check_order("kind", name, self.kinds.len(), id.0) {
            self.kinds.push(KindDef {
                id,
                name,
                bases: bases.to_vec(),
                is_abstract,
                special,
                attrs: Vec::new(),
                edges: Vec::new(),
            });
        }
        self
    }

    fn check_order(&mut self, what: &'static str, name: &'static str, expected: usize, found: u16) -> bool {
        if expected == found as usize {
            return true;
        }
        self.fail(SchemaError::OutOfOrder {
            what,
            name,
            expected: expected as u16,
            found,
        });
        false
    }

    fn check_known(&mut self, what: &'static str, name: &'static str, owner: NodeKind) -> bool {
        if owner.index() < self.kinds.len() {
            return true;
        }
        self.fail(SchemaError::UnknownKind {
            what,
            name,
            kind: owner,
        });
        false
    }

    fn check_role(&mut self, role: &'static str, attr: AttrId, expected: AttrType) -> bool {
        let matches = self
            .attrs
            .get(attr.index())
            .map(|a| std::mem::discriminant(&a.ty) == std::mem::discriminant(&expected));
        match matches {
            Some(true) => true,
            Some(false) => {
                let name = self.attrs[attr.index()].name;
                self.fail(SchemaError::RoleAttribute {
                    role,
                    attr: name,
                    expected: expected.name(),
                });
                false
            }
            None => {
                self.fail(SchemaError::RoleAttribute {
                    role,
                    attr: "?",
                    expected: expected.name(),
                });
                false
            }
        }
    }

    fn fail(&mut self, err: SchemaError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
