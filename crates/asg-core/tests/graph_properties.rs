//! Property tests for the arena, the edge model and the reverse-edge index.
//!
//! Random edit sequences are applied to a small Python graph; after every
//! sequence the incrementally maintained reverse index must equal a freshly
//! built one, no edge may name a dead node, and containment back-pointers
//! must agree with the forward edges.

use std::collections::HashMap;

use proptest::prelude::*;

use asg_core::catalog::python::{self, edge, kind};
use asg_core::{
    traverse, Arena, ArenaConfig, EdgeKind, NodeId, NodeKind, NodeRef, PreorderConfig, ReverseEdges, Visitor,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const POOL: &[NodeKind] = &[
    kind::MODULE,
    kind::SUITE,
    kind::ASSIGN,
    kind::IDENTIFIER,
    kind::OBJECT,
    kind::CALL,
    kind::FUNCTION_DEF,
    kind::RETURN,
];

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    ModuleStatement(u32, u32),
    SuiteStatement(u32, u32),
    AssignValue(u32, u32),
    CallArgument(u32, u32),
    RefersTo(u32, u32),
    ModuleObject(u32, u32),
    CallRefersTo(u32, u32),
    Remove(u32, u16, u32),
    Clear(u32, u16),
    Delete(u32),
    DeleteSubtree(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let id = 1u32..24;
    let edge = 0u16..25;
    prop_oneof![
        (0..POOL.len()).prop_map(Op::Create),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::ModuleStatement(a, b)),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::SuiteStatement(a, b)),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::AssignValue(a, b)),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::CallArgument(a, b)),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::RefersTo(a, b)),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::ModuleObject(a, b)),
        (id.clone(), id.clone()).prop_map(|(a, b)| Op::CallRefersTo(a, b)),
        (id.clone(), edge.clone(), id.clone()).prop_map(|(a, e, b)| Op::Remove(a, e, b)),
        (id.clone(), edge).prop_map(|(a, e)| Op::Clear(a, e)),
        id.clone().prop_map(Op::Delete),
        id.prop_map(Op::DeleteSubtree),
    ]
}

fn seeded_arena(reverse: bool) -> Arena {
    let mut arena = Arena::with_config(python::schema(), ArenaConfig { panic_on_misuse: false });
    if reverse {
        arena.enable_reverse_edges();
    }
    for i in 0..16 {
        arena.create(POOL[i % POOL.len()]).unwrap();
    }
    arena
}

/// Applies one edit. Rejected edits are expected and ignored.
fn apply(arena: &mut Arena, op: &Op) {
    let _ = match *op {
        Op::Create(k) => arena.create(POOL[k]).map(|_| ()),
        Op::ModuleStatement(a, b) => arena.add_edge(NodeId(a), edge::MODULE_HAS_STATEMENT, NodeId(b)),
        Op::SuiteStatement(a, b) => arena.add_edge(NodeId(a), edge::SUITE_HAS_STATEMENT, NodeId(b)),
        Op::AssignValue(a, b) => arena.set_edge(NodeId(a), edge::ASSIGN_HAS_EXPRESSION, NodeId(b)),
        Op::CallArgument(a, b) => arena.add_edge(NodeId(a), edge::CALL_HAS_ARGUMENT, NodeId(b)),
        Op::RefersTo(a, b) => arena.set_edge(NodeId(a), edge::IDENTIFIER_REFERS_TO, NodeId(b)),
        Op::ModuleObject(a, b) => arena.add_edge(NodeId(a), edge::MODULE_HAS_OBJECT, NodeId(b)),
        Op::CallRefersTo(a, b) => arena.set_edge(NodeId(a), edge::CALL_REFERS_TO, NodeId(b)),
        Op::Remove(a, e, b) => arena.remove_edge(NodeId(a), EdgeKind(e), NodeId(b)),
        Op::Clear(a, e) => arena.clear_edge(NodeId(a), EdgeKind(e)).map(|_| ()),
        Op::Delete(a) => arena.delete(NodeId(a)),
        Op::DeleteSubtree(a) => arena.delete_subtree(NodeId(a)).map(|_| ()),
    };
}

fn assert_forward_invariants(arena: &Arena) {
    let schema = arena.schema();
    for node in arena.nodes() {
        for (edge, targets) in node.edges() {
            let containment = schema.edge(edge).unwrap().is_containment();
            for &target in targets {
                assert!(arena.contains(target), "edge {edge} of {} names dead node {target}", node.id());
                if containment {
                    let parent = arena.parent(target).unwrap();
                    assert_eq!((parent.node, parent.edge), (node.id(), edge));
                }
            }
        }
        if let Some(parent) = node.parent() {
            let container = arena.get(parent.node).expect("container is live");
            assert!(container.raw_targets(parent.edge).contains(&node.id()));
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn reverse_index_matches_rebuild(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut arena = seeded_arena(true);
        for op in &ops {
            apply(&mut arena, op);
        }
        let incremental = arena.reverse_edges().unwrap().clone();
        let rebuilt = ReverseEdges::build(&arena);
        prop_assert_eq!(incremental.edge_count(), arena.edge_count());
        prop_assert!(incremental == rebuilt);

        // Every forward edge is answered by a reverse query and vice versa.
        for node in arena.nodes() {
            for (edge, targets) in node.edges() {
                for &target in targets {
                    let sources: Vec<_> = arena.reverse_sources(target, edge).unwrap().collect();
                    prop_assert!(sources.contains(&node.id()));
                }
            }
            for (edge, source) in incremental.incoming(node.id()) {
                let forward = arena.get(source).unwrap();
                prop_assert!(forward.raw_targets(edge).contains(&node.id()));
            }
        }
    }

    #[test]
    fn forward_edges_stay_consistent(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut arena = seeded_arena(false);
        for op in &ops {
            apply(&mut arena, op);
        }
        assert_forward_invariants(&arena);
    }

    #[test]
    fn index_and_scan_deletion_agree(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut indexed = seeded_arena(true);
        let mut scanned = seeded_arena(false);
        for op in &ops {
            apply(&mut indexed, op);
            apply(&mut scanned, op);
        }
        let shape = |arena: &Arena| -> Vec<(NodeId, Vec<(EdgeKind, Vec<NodeId>)>)> {
            arena
                .nodes()
                .map(|n| (n.id(), n.edges().map(|(e, t)| (e, t.to_vec())).collect()))
                .collect()
        };
        prop_assert_eq!(shape(&indexed), shape(&scanned));
    }

    #[test]
    fn safe_preorder_visits_visible_tree_once(
        parents in prop::collection::vec(any::<prop::sample::Index>(), 1..40),
        hidden in prop::collection::vec(any::<bool>(), 41),
    ) {
        // Node i + 2 hangs under one of the nodes created before it.
        let mut arena = Arena::new(python::schema());
        let root = arena.create(kind::CALL).unwrap();
        let mut ids = vec![root];
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for parent in &parents {
            let parent = ids[parent.index(ids.len())];
            let child = arena.create(kind::CALL).unwrap();
            arena.add_edge(parent, edge::CALL_HAS_ARGUMENT, child).unwrap();
            children.entry(parent).or_default().push(child);
            ids.push(child);
        }
        for (&id, &flag) in ids.iter().zip(&hidden).skip(1) {
            arena.set_filtered(id, flag).unwrap();
        }

        let mut expected = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            expected.push(format!("+{id}"));
            if let Some(kids) = children.get(&id) {
                for &kid in kids.iter().rev() {
                    if !arena.is_filtered(kid) {
                        stack.push(kid);
                    }
                }
            }
        }

        let mut order = Order::default();
        let config = PreorderConfig { safe_mode: true, ..PreorderConfig::default() };
        let summary = traverse(&arena, &mut order, config);
        let entered: Vec<_> = order.events.iter().filter(|e| e.starts_with('+')).cloned().collect();
        prop_assert_eq!(&entered, &expected);
        prop_assert_eq!(summary.visited, expected.len());

        // Every visit_end follows all descendants: events form balanced brackets.
        let mut open = Vec::new();
        for event in &order.events {
            if let Some(id) = event.strip_prefix('+') {
                open.push(id.to_string());
            } else if let Some(id) = event.strip_prefix('-') {
                let popped = open.pop();
                prop_assert_eq!(popped.as_deref(), Some(id));
            }
        }
        prop_assert!(open.is_empty());
    }
}

#[derive(Default)]
struct Order {
    events: Vec<String>,
}

impl Visitor for Order {
    fn visit(&mut self, node: NodeRef<'_>) {
        self.events.push(format!("+{}", node.id()));
    }

    fn visit_end(&mut self, node: NodeRef<'_>) {
        self.events.push(format!("-{}", node.id()));
    }
}

// ---------------------------------------------------------------------------
// Fixed scenarios
// ---------------------------------------------------------------------------

#[test]
fn created_node_has_defaults_and_no_edges() {
    let mut arena = Arena::new(python::schema());
    for &k in POOL {
        let id = arena.create(k).unwrap();
        let node = arena.get(id).unwrap();
        assert_eq!(node.kind(), k);
        assert!(node.edges().all(|(_, targets)| targets.is_empty()));
        assert!(node.parent().is_none());
    }
}

#[test]
fn containment_moves_between_owners() {
    let mut arena = Arena::new(python::schema());
    let a = arena.create(kind::MODULE).unwrap();
    let c = arena.create(kind::SUITE).unwrap();
    let b = arena.create(kind::RETURN).unwrap();
    arena.enable_reverse_edges();
    arena.add_edge(a, edge::MODULE_HAS_STATEMENT, b).unwrap();
    arena.add_edge(c, edge::SUITE_HAS_STATEMENT, b).unwrap();

    assert!(arena.get(a).unwrap().raw_targets(edge::MODULE_HAS_STATEMENT).is_empty());
    assert_eq!(arena.parent(b).map(|p| p.node), Some(c));
    assert_eq!(arena.reverse_sources(b, edge::MODULE_HAS_STATEMENT).unwrap().count(), 0);
    assert_eq!(
        arena.reverse_sources(b, edge::SUITE_HAS_STATEMENT).unwrap().collect::<Vec<_>>(),
        vec![c]
    );
}
