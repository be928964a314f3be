//! Visitor protocol.
//!
//! A [`Visitor`] receives `visit` / `visit_end` for every node a traversal
//! enters and leaves, and `visit_edge` / `visit_edge_end` around every edge
//! it walks. All methods default to no-ops.
//!
//! Passes that want per-kind behaviour use a [`Dispatcher`]: handlers are
//! registered per concrete or abstract kind on a [`DispatchBuilder`], and
//! [`DispatchBuilder::build`] resolves, once, the handler every concrete kind
//! uses. A kind without its own handler inherits the one of its nearest
//! ancestor, so a pass can be written against a capability such as
//! "any expression" instead of every concrete kind.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::id::{EdgeKind, NodeKind};
use crate::node::NodeRef;
use crate::schema::Schema;

/// Receiver of traversal events.
pub trait Visitor {
    fn visit(&mut self, _node: NodeRef<'_>) {}

    fn visit_end(&mut self, _node: NodeRef<'_>) {}

    /// Fired immediately before `target` is reached through `edge`.
    fn visit_edge(&mut self, _edge: EdgeKind, _source: NodeRef<'_>, _target: NodeRef<'_>) {}

    /// Fired immediately after `target` has been fully handled.
    fn visit_edge_end(&mut self, _edge: EdgeKind, _source: NodeRef<'_>, _target: NodeRef<'_>) {}

    /// Polled by the traversal at safe points. Returning `true` removes this
    /// visitor from the run.
    fn stop_requested(&self) -> bool {
        false
    }

    /// Called when a run finishes so the visitor can be reused.
    fn clear_stop_request(&mut self) {}
}

/// Per-kind node handler. `Break` asks the traversal to stop this visitor.
pub type NodeHandler<S> = fn(&mut S, NodeRef<'_>) -> ControlFlow<()>;

/// Per-edge-kind handler, receiving the source and target.
pub type EdgeHandler<S> = fn(&mut S, NodeRef<'_>, NodeRef<'_>) -> ControlFlow<()>;

/// Resolved handler table.
pub struct DispatchTable<S> {
    visit: Vec<Option<NodeHandler<S>>>,
    visit_end: Vec<Option<NodeHandler<S>>>,
    edge: Vec<Option<EdgeHandler<S>>>,
    edge_end: Vec<Option<EdgeHandler<S>>>,
}

impl<S> DispatchTable<S> {
    pub fn visit_handler(&self, kind: NodeKind) -> Option<NodeHandler<S>> {
        self.visit.get(kind.index()).copied().flatten()
    }

    pub fn visit_end_handler(&self, kind: NodeKind) -> Option<NodeHandler<S>> {
        self.visit_end.get(kind.index()).copied().flatten()
    }
}

/// Collects handler registrations for a [`DispatchTable`].
pub struct DispatchBuilder<S> {
    schema: Arc<Schema>,
    visit: HashMap<NodeKind, NodeHandler<S>>,
    visit_end: HashMap<NodeKind, NodeHandler<S>>,
    edge: HashMap<EdgeKind, EdgeHandler<S>>,
    edge_end: HashMap<EdgeKind, EdgeHandler<S>>,
}

impl<S> DispatchBuilder<S> {
    pub fn new(schema: Arc<Schema>) -> Self {
        DispatchBuilder {
            schema,
            visit: HashMap::new(),
            visit_end: HashMap::new(),
            edge: HashMap::new(),
            edge_end: HashMap::new(),
        }
    }

    pub fn on_visit(mut self, kind: NodeKind, handler: NodeHandler<S>) -> Self {
        self.visit.insert(kind, handler);
        self
    }

    pub fn on_visit_end(mut self, kind: NodeKind, handler: NodeHandler<S>) -> Self {
        self.visit_end.insert(kind, handler);
        self
    }

    pub fn on_edge(mut self, edge: EdgeKind, handler: EdgeHandler<S>) -> Self {
        self.edge.insert(edge, handler);
        self
    }

    pub fn on_edge_end(mut self, edge: EdgeKind, handler: EdgeHandler<S>) -> Self {
        self.edge_end.insert(edge, handler);
        self
    }

    /// Resolves the handler of every kind.
    pub fn build(self) -> DispatchTable<S> {
        let kinds = self.schema.kind_count();
        let visit = (0..kinds)
            .map(|k| nearest(&self.schema, NodeKind(k as u16), &self.visit))
            .collect();
        let visit_end = (0..kinds)
            .map(|k| nearest(&self.schema, NodeKind(k as u16), &self.visit_end))
            .collect();
        let edges = self.schema.edge_count();
        let edge = (0..edges)
            .map(|e| self.edge.get(&EdgeKind(e as u16)).copied())
            .collect();
        let edge_end = (0..edges)
            .map(|e| self.edge_end.get(&EdgeKind(e as u16)).copied())
            .collect();
        DispatchTable {
            visit,
            visit_end,
            edge,
            edge_end,
        }
    }
}

/// Breadth-first over bases: the kind itself, then direct bases in
/// declaration order, then their bases.
fn nearest<H: Copy>(schema: &Schema, kind: NodeKind, handlers: &HashMap<NodeKind, H>) -> Option<H> {
    let mut queue = VecDeque::from([kind]);
    let mut seen = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        if let Some(&handler) = handlers.get(&current) {
            return Some(handler);
        }
        if let Some(def) = schema.kind(current) {
            queue.extend(def.bases.iter().copied());
        }
    }
    None
}

/// A [`Visitor`] that routes events through a [`DispatchTable`] into a
/// state value.
pub struct Dispatcher<S> {
    table: Arc<DispatchTable<S>>,
    state: S,
    stopped: bool,
}

impl<S> Dispatcher<S> {
    pub fn new(table: Arc<DispatchTable<S>>, state: S) -> Self {
        Dispatcher {
            table,
            state,
            stopped: false,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Requests a stop at the next safe point.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    fn record(&mut self, flow: ControlFlow<()>) {
        if flow.is_break() {
            self.stopped = true;
        }
    }
}

impl<S> Visitor for Dispatcher<S> {
    fn visit(&mut self, node: NodeRef<'_>) {
        if let Some(handler) = self.table.visit_handler(node.kind()) {
            let flow = handler(&mut self.state, node);
            self.record(flow);
        }
    }

    fn visit_end(&mut self, node: NodeRef<'_>) {
        if let Some(handler) = self.table.visit_end_handler(node.kind()) {
            let flow = handler(&mut self.state, node);
            self.record(flow);
        }
    }

    fn visit_edge(&mut self, edge: EdgeKind, source: NodeRef<'_>, target: NodeRef<'_>) {
        if let Some(handler) = self.table.edge.get(edge.index()).copied().flatten() {
            let flow = handler(&mut self.state, source, target);
            self.record(flow);
        }
    }

    fn visit_edge_end(&mut self, edge: EdgeKind, source: NodeRef<'_>, target: NodeRef<'_>) {
        if let Some(handler) = self.table.edge_end.get(edge.index()).copied().flatten() {
            let flow = handler(&mut self.state, source, target);
            self.record(flow);
        }
    }

    fn stop_requested(&self) -> bool {
        self.stopped
    }

    fn clear_stop_request(&mut self) {
        self.stopped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::catalog::python::{self, edge, kind};
    use crate::traversal::{traverse, PreorderConfig};

    #[derive(Default)]
    struct Counts {
        expressions: usize,
        identifiers: usize,
        statements: usize,
        ends: usize,
        targets: usize,
    }

    fn on_expression(s: &mut Counts, _: NodeRef<'_>) -> ControlFlow<()> {
        s.expressions += 1;
        ControlFlow::Continue(())
    }

    fn on_identifier(s: &mut Counts, _: NodeRef<'_>) -> ControlFlow<()> {
        s.identifiers += 1;
        ControlFlow::Continue(())
    }

    fn on_statement(s: &mut Counts, _: NodeRef<'_>) -> ControlFlow<()> {
        s.statements += 1;
        ControlFlow::Continue(())
    }

    fn on_any_end(s: &mut Counts, _: NodeRef<'_>) -> ControlFlow<()> {
        s.ends += 1;
        ControlFlow::Continue(())
    }

    fn on_target(s: &mut Counts, _: NodeRef<'_>, _: NodeRef<'_>) -> ControlFlow<()> {
        s.targets += 1;
        ControlFlow::Continue(())
    }

    fn sample() -> Arena {
        let mut arena = Arena::new(python::schema());
        let assign = arena.create(kind::ASSIGN).unwrap();
        let target = arena.create(kind::IDENTIFIER).unwrap();
        let value = arena.create(kind::BINARY_ARITHMETIC).unwrap();
        let left = arena.create(kind::INTEGER_LITERAL).unwrap();
        let right = arena.create(kind::IDENTIFIER).unwrap();
        arena.add_edge(assign, edge::ASSIGN_HAS_TARGET, target).unwrap();
        arena.set_edge(assign, edge::ASSIGN_HAS_EXPRESSION, value).unwrap();
        arena.set_edge(value, edge::ARITHMETIC_HAS_LEFT, left).unwrap();
        arena.set_edge(value, edge::ARITHMETIC_HAS_RIGHT, right).unwrap();
        arena
    }

    #[test]
    fn handlers_resolve_to_nearest_ancestor() {
        let table = DispatchBuilder::<Counts>::new(python::schema())
            .on_visit(kind::EXPRESSION, on_expression)
            .on_visit(kind::IDENTIFIER, on_identifier)
            .on_visit(kind::STATEMENT, on_statement)
            .on_visit_end(kind::BASE, on_any_end)
            .on_edge(edge::ASSIGN_HAS_TARGET, on_target)
            .build();
        let mut dispatcher = Dispatcher::new(Arc::new(table), Counts::default());

        let arena = sample();
        traverse(&arena, &mut dispatcher, PreorderConfig::default());

        let counts = dispatcher.into_state();
        // BinaryArithmetic and IntegerLiteral fall back to Expression;
        // Identifier has its own handler and does not also run Expression's.
        assert_eq!(counts.expressions, 2);
        assert_eq!(counts.identifiers, 2);
        assert_eq!(counts.statements, 1);
        assert_eq!(counts.ends, 5);
        assert_eq!(counts.targets, 1);
    }

    #[test]
    fn unhandled_kinds_are_ignored() {
        let table: DispatchTable<Counts> = DispatchBuilder::new(python::schema()).build();
        assert!(table.visit_handler(kind::ASSIGN).is_none());
        assert!(table.visit_handler(NodeKind(500)).is_none());
    }

    #[test]
    fn break_requests_stop() {
        fn stop_at_first(s: &mut Counts, _: NodeRef<'_>) -> ControlFlow<()> {
            s.statements += 1;
            ControlFlow::Break(())
        }
        let table = DispatchBuilder::<Counts>::new(python::schema())
            .on_visit(kind::BASE, stop_at_first)
            .build();
        let mut dispatcher = Dispatcher::new(Arc::new(table), Counts::default());
        let arena = sample();
        let summary = traverse(&arena, &mut dispatcher, PreorderConfig::default());
        assert_eq!(summary.visited, 1);
        assert_eq!(dispatcher.state().statements, 1);
        // The run resets the request so the dispatcher can be reused.
        assert!(!dispatcher.stop_requested());
    }
}
