//! End-to-end tests for the relation graph.
//!
//! Random add/remove sequences against a small kinship relation domain:
//! every stored edge must be visible from both ends, no relation cap may
//! ever be exceeded, and rejected mutations must leave the graph as it was.

use hashbrown::HashSet;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use soma::graph::{Relation, RelationGraph};
use soma::Error;

// ============================================================================
// Helper: a relation domain with an inverse pair and two caps.
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kin {
    ParentOf,
    ChildOf,
    Spouse,
    Sibling,
}

const ALL: [Kin; 4] = [Kin::ParentOf, Kin::ChildOf, Kin::Spouse, Kin::Sibling];

impl Relation<u8> for Kin {
    fn is_bidirectional(&self) -> bool {
        matches!(self, Kin::Spouse | Kin::Sibling)
    }

    fn inverse(&self) -> Self {
        match self {
            Kin::ParentOf => Kin::ChildOf,
            Kin::ChildOf => Kin::ParentOf,
            other => *other,
        }
    }

    fn max_permitted(&self) -> Option<usize> {
        match self {
            Kin::Spouse => Some(1),
            Kin::ChildOf => Some(2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add(u8, Kin, u8),
    Remove(u8, Kin, u8),
    Drop(u8),
}

fn kin() -> impl Strategy<Value = Kin> {
    prop::sample::select(ALL.to_vec())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, kin(), 0u8..6).prop_map(|(a, r, b)| Op::Add(a, r, b)),
        2 => (0u8..6, kin(), 0u8..6).prop_map(|(a, r, b)| Op::Remove(a, r, b)),
        1 => (0u8..6).prop_map(Op::Drop),
    ]
}

fn snapshot(g: &RelationGraph<u8, Kin>) -> Vec<(u8, Kin, u8)> {
    let mut edges: Vec<_> = g.edges().map(|e| (e.src, e.rel, e.dst)).collect();
    edges.sort_by_key(|&(a, r, b)| (a, r as u8, b));
    edges
}

proptest! {
    #[test]
    fn prop_every_edge_visible_from_both_ends(ops in prop::collection::vec(op(), 1..60)) {
        let mut g = RelationGraph::new();
        for op in ops {
            match op {
                Op::Add(a, r, b) => { let _ = g.add_edge(a, r, b); }
                Op::Remove(a, r, b) => {
                    if g.remove_edge(a, r, b) {
                        prop_assert!(!g.contains_edge(b, r.inverse(), a));
                    }
                }
                Op::Drop(n) => { g.remove(n); }
            }
        }
        for e in g.edges() {
            prop_assert!(g.contains_edge(e.src, e.rel, e.dst));
            prop_assert!(g.contains_edge(e.dst, e.rel.inverse(), e.src));
            prop_assert!(g.edges_from(e.dst).any(|seen| seen.rel == e.rel.inverse() && seen.dst == e.src));
        }
    }

    #[test]
    fn prop_caps_never_exceeded(ops in prop::collection::vec(op(), 1..80)) {
        let mut g = RelationGraph::new();
        for op in ops {
            match op {
                Op::Add(a, r, b) => { let _ = g.add_edge(a, r, b); }
                Op::Remove(a, r, b) => { g.remove_edge(a, r, b); }
                Op::Drop(n) => { g.remove(n); }
            }
            for node in 0u8..6 {
                for rel in ALL {
                    if let Some(max) = rel.max_permitted() {
                        prop_assert!(g.out_degree(node, rel) <= max);
                    }
                }
            }
        }
    }

    #[test]
    fn prop_rejected_adds_change_nothing(ops in prop::collection::vec(op(), 1..40), probe in (0u8..6, kin(), 0u8..6)) {
        let mut g = RelationGraph::new();
        for op in ops {
            if let Op::Add(a, r, b) = op { let _ = g.add_edge(a, r, b); }
        }
        let before = snapshot(&g);
        let (a, r, b) = probe;
        if g.add_edge(a, r, b).is_err() {
            prop_assert_eq!(snapshot(&g), before);
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_inverse_pair_is_one_edge() {
    let mut g = RelationGraph::new();
    assert!(g.add_edge(1u8, Kin::ParentOf, 2).unwrap());
    assert!(!g.add_edge(2, Kin::ChildOf, 1).unwrap());
    assert_eq!(g.edge_count(), 1);
    assert_eq!(g.neighbours(2, &[Kin::ChildOf]), vec![1]);
}

#[test]
fn test_capacity_counts_implicit_inverses() {
    let mut g = RelationGraph::new();
    g.add_edge(1u8, Kin::Spouse, 2).unwrap();
    // 2 already has a spouse through the implicit inverse.
    assert!(matches!(g.add_edge(2, Kin::Spouse, 3), Err(Error::Capacity { max: 1, .. })));
    assert!(matches!(g.add_edge(3, Kin::Spouse, 1), Err(Error::Capacity { .. })));

    g.add_edge(5, Kin::ParentOf, 4).unwrap();
    g.add_edge(6, Kin::ParentOf, 4).unwrap();
    assert!(matches!(g.add_edge(7, Kin::ParentOf, 4), Err(Error::Capacity { .. })));
}

#[test]
fn test_split_conserves_edges() {
    let mut g = RelationGraph::new();
    g.add_edge(1u8, Kin::ParentOf, 2).unwrap();
    g.add_edge(2, Kin::Sibling, 3).unwrap();
    g.add_edge(3, Kin::ParentOf, 4).unwrap();
    let before = g.edge_count();

    let nodes: HashSet<u8> = [3, 4].into_iter().collect();
    let (other, crossing) = g.split_off(&nodes);
    assert_eq!(g.edge_count() + other.edge_count() + crossing.len(), before);
    assert_eq!(crossing.len(), 1);
    assert!(other.contains_edge(4, Kin::ChildOf, 3));
    assert!(!g.contains(3));
}

#[test]
fn test_disconnect_returns_incident_edges() {
    let mut g = RelationGraph::new();
    g.add_edge(1u8, Kin::Sibling, 2).unwrap();
    g.add_edge(3, Kin::ParentOf, 1).unwrap();
    let removed = g.disconnect(1);
    assert_eq!(removed.len(), 2);
    assert!(g.contains(1));
    assert_eq!(g.degree(1), 0);
    assert_eq!(g.remove_bare_nodes(), 3);
}
