//! Depth-first preorder traversal over containment edges.
//!
//! [`Preorder`] walks the containment forest in schema-declared child order,
//! fanning every event out to its attached [`Visitor`]s in attachment order.
//! The walk uses an explicit frame stack, so deep trees never recurse.
//!
//! # Modes
//!
//! - `safe_mode`: every node is visited at most once per run.
//! - `visit_cross_edge_tree`: reference-edge targets are walked as extra
//!   subtrees once the main walk is done (optionally restricted to
//!   `cross_edges`).
//! - `visit_filtered_edges`: edges to filtered nodes are still followed.
//! - `visit_special_nodes` / `used_special_only`: out-of-tree shared nodes
//!   are visited once per run, either all of them or only those actually
//!   referenced during the run.
//!
//! # Cancellation
//!
//! After each node's `visit_end` the engine polls every active visitor's
//! [`Visitor::stop_requested`] and drops those that asked to stop. If every
//! active visitor asks to stop right after `visit`, the node's children are
//! skipped. The run ends early, without error, once no visitor is left.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::id::{EdgeKind, NodeId};
use crate::node::NodeRef;
use crate::schema::EdgeRole;
use crate::visitor::Visitor;

/// Traversal options, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreorderConfig {
    pub safe_mode: bool,
    pub visit_cross_edge_tree: bool,
    pub visit_filtered_edges: bool,
    pub visit_special_nodes: bool,
    pub used_special_only: bool,
    /// Reference edges followed by `visit_cross_edge_tree`. Empty means all.
    pub cross_edges: Vec<EdgeKind>,
}

impl Default for PreorderConfig {
    fn default() -> Self {
        PreorderConfig {
            safe_mode: false,
            visit_cross_edge_tree: false,
            visit_filtered_edges: false,
            visit_special_nodes: true,
            used_special_only: false,
            cross_edges: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    /// Every visitor asked to stop before the walk was done.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Nodes entered, revisits included.
    pub visited: usize,
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Enter { node: NodeId, depth: usize },
    EdgeBegin { edge: EdgeKind, source: NodeId, target: NodeId },
    EdgeEnd { edge: EdgeKind, source: NodeId, target: NodeId },
    Exit { node: NodeId },
}

/// Preorder traversal engine.
pub struct Preorder<'v> {
    config: PreorderConfig,
    visitors: Vec<&'v mut dyn Visitor>,
    state: RunState,
    // Per-run state, reset by `finish`.
    active: Vec<bool>,
    visited: Vec<bool>,
    deferred: VecDeque<NodeId>,
    stack: Vec<Frame>,
    count: usize,
}

impl<'v> Preorder<'v> {
    pub fn new(config: PreorderConfig) -> Self {
        Preorder {
            config,
            visitors: Vec::new(),
            state: RunState::Idle,
            active: Vec::new(),
            visited: Vec::new(),
            deferred: VecDeque::new(),
            stack: Vec::new(),
            count: 0,
        }
    }

    pub fn config(&self) -> &PreorderConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Attaches a visitor. Visitors receive events in attachment order.
    pub fn add_visitor(&mut self, visitor: &'v mut dyn Visitor) {
        self.visitors.push(visitor);
    }

    pub fn visitor_count(&self) -> usize {
        self.visitors.len()
    }

    /// Walks every root in id order, then the special nodes.
    ///
    /// Roots are live non-special nodes without a container. Filtered roots
    /// are skipped unless `visit_filtered_edges` is set.
    pub fn run(&mut self, arena: &Arena) -> RunSummary {
        self.begin(arena);
        let flow = self.run_all(arena);
        self.finish(flow)
    }

    /// Walks the subtree under `root` (plus any deferred cross-edge and
    /// special targets).
    pub fn run_from(&mut self, arena: &Arena, root: NodeId) -> RunSummary {
        self.begin(arena);
        let flow = match self.walk(arena, root) {
            ControlFlow::Continue(()) => self.drain_deferred(arena),
            stopped => stopped,
        };
        self.finish(flow)
    }

    fn run_all(&mut self, arena: &Arena) -> ControlFlow<()> {
        let roots: Vec<NodeId> = arena.roots().map(|n| n.id()).collect();
        for root in roots {
            self.walk(arena, root)?;
        }
        self.drain_deferred(arena)?;

        if self.config.visit_special_nodes && !self.config.used_special_only {
            let specials: Vec<NodeId> = arena.nodes().filter(|n| n.is_special()).map(|n| n.id()).collect();
            for special in specials {
                if !self.was_visited(special) {
                    self.walk(arena, special)?;
                    self.drain_deferred(arena)?;
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn begin(&mut self, arena: &Arena) {
        self.state = RunState::Running;
        self.active = vec![true; self.visitors.len()];
        self.visited = if self.tracking() {
            vec![false; arena.slot_count()]
        } else {
            Vec::new()
        };
        self.deferred.clear();
        self.stack.clear();
        self.count = 0;
    }

    fn finish(&mut self, flow: ControlFlow<()>) -> RunSummary {
        for visitor in self.visitors.iter_mut() {
            visitor.clear_stop_request();
        }
        let summary = RunSummary {
            outcome: if flow.is_break() {
                RunOutcome::Stopped
            } else {
                RunOutcome::Completed
            },
            visited: self.count,
        };
        self.active.clear();
        self.visited = Vec::new();
        self.deferred.clear();
        self.stack.clear();
        self.count = 0;
        self.state = RunState::Idle;
        summary
    }

    /// Whether this run needs a visited set.
    fn tracking(&self) -> bool {
        self.config.safe_mode || self.config.visit_cross_edge_tree || self.config.visit_special_nodes
    }

    fn was_visited(&self, node: NodeId) -> bool {
        self.visited.get(node.index()).copied().unwrap_or(false)
    }

    fn drain_deferred(&mut self, arena: &Arena) -> ControlFlow<()> {
        while let Some(next) = self.deferred.pop_front() {
            if !self.was_visited(next) {
                self.walk(arena, next)?;
            }
        }
        ControlFlow::Continue(())
    }

    fn walk(&mut self, arena: &Arena, root: NodeId) -> ControlFlow<()> {
        if !self.config.visit_filtered_edges && arena.is_filtered(root) {
            return ControlFlow::Continue(());
        }
        self.stack.push(Frame::Enter { node: root, depth: 0 });

        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Enter { node, depth } => {
                    let Some(node) = arena.get(node) else {
                        continue;
                    };
                    if self.tracking() {
                        let seen = self.was_visited(node.id());
                        if seen && self.config.safe_mode {
                            tracing::trace!(node = %node.id(), "skipping revisit");
                            continue;
                        }
                        if let Some(slot) = self.visited.get_mut(node.id().index()) {
                            *slot = true;
                        }
                    } else {
                        debug_assert!(
                            depth <= arena.slot_count(),
                            "containment cycle through node {}",
                            node.id()
                        );
                    }
                    self.count += 1;
                    self.each_active(|v| v.visit(node));
                    self.stack.push(Frame::Exit { node: node.id() });
                    if self.all_stopping() {
                        continue;
                    }
                    self.push_children(arena, node, depth);
                }
                Frame::EdgeBegin { edge, source, target } => {
                    if let (Some(s), Some(t)) = (arena.get(source), arena.get(target)) {
                        self.each_active(|v| v.visit_edge(edge, s, t));
                    }
                }
                Frame::EdgeEnd { edge, source, target } => {
                    if let (Some(s), Some(t)) = (arena.get(source), arena.get(target)) {
                        self.each_active(|v| v.visit_edge_end(edge, s, t));
                    }
                }
                Frame::Exit { node } => {
                    if let Some(node) = arena.get(node) {
                        self.each_active(|v| v.visit_end(node));
                    }
                    // Safe point.
                    for (visitor, active) in self.visitors.iter().zip(self.active.iter_mut()) {
                        if *active && visitor.stop_requested() {
                            *active = false;
                        }
                    }
                    if self.none_active() {
                        self.stack.clear();
                        return ControlFlow::Break(());
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn push_children(&mut self, arena: &Arena, node: NodeRef<'_>, depth: usize) {
        let schema = arena.schema();
        let source = node.id();
        let mut frames = Vec::new();

        for (edge, targets) in node.edges() {
            let containment = schema.edge(edge).is_some_and(|def| def.role == EdgeRole::Containment);
            for &target in targets {
                if !self.config.visit_filtered_edges && arena.is_filtered(target) {
                    continue;
                }
                frames.push(Frame::EdgeBegin { edge, source, target });
                if containment {
                    frames.push(Frame::Enter {
                        node: target,
                        depth: depth + 1,
                    });
                } else if self.follows(arena, edge, target) {
                    self.deferred.push_back(target);
                }
                frames.push(Frame::EdgeEnd { edge, source, target });
            }
        }
        self.stack.extend(frames.into_iter().rev());
    }

    /// Whether a reference edge's target is scheduled for a deferred walk.
    fn follows(&self, arena: &Arena, edge: EdgeKind, target: NodeId) -> bool {
        let special = arena.get(target).is_some_and(|t| t.is_special());
        if special {
            return self.config.visit_special_nodes;
        }
        self.config.visit_cross_edge_tree
            && (self.config.cross_edges.is_empty() || self.config.cross_edges.contains(&edge))
    }

    /// Every active visitor asked to stop. False for a run without visitors.
    fn all_stopping(&self) -> bool {
        let mut active = self
            .visitors
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .peekable();
        active.peek().is_some() && active.all(|(v, _)| v.stop_requested())
    }

    /// Visitors were attached and all of them have left the run.
    fn none_active(&self) -> bool {
        !self.active.is_empty() && !self.active.iter().any(|&a| a)
    }

    fn each_active(&mut self, mut f: impl FnMut(&mut (dyn Visitor + 'v))) {
        for (visitor, &active) in self.visitors.iter_mut().zip(&self.active) {
            if active {
                f(&mut **visitor);
            }
        }
    }
}

/// Runs a single visitor over the whole arena.
pub fn traverse(arena: &Arena, visitor: &mut dyn Visitor, config: PreorderConfig) -> RunSummary {
    let mut preorder = Preorder::new(config);
    preorder.add_visitor(visitor);
    preorder.run(arena)
}
