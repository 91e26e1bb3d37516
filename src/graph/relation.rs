//! Relation types and edges.

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;

/// Node identity usable in a [`RelationGraph`](super::RelationGraph).
pub trait GraphNode: Copy + Eq + Hash + Debug {}
impl<T: Copy + Eq + Hash + Debug> GraphNode for T {}

/// A closed, typed relation domain.
///
/// Every relation either is its own inverse (`is_bidirectional`) or
/// names its inverse. `inverse` must be an involution:
/// `r.inverse().inverse() == r`.
pub trait Relation<N>: Copy + Eq + Hash + Debug {
    fn is_bidirectional(&self) -> bool;

    /// The relation seen from the other end. Bidirectional relations
    /// return themselves.
    fn inverse(&self) -> Self;

    /// Maximum number of outgoing edges of this relation per node.
    fn max_permitted(&self) -> Option<usize> {
        None
    }

    /// Endpoint constraint; rejected endpoints are a programming error.
    fn accepts(&self, _src: &N, _dst: &N) -> bool {
        true
    }
}

/// A directed edge `(src) -[rel]-> (dst)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge<N, R> {
    pub src: N,
    pub rel: R,
    pub dst: N,
}

impl<N: GraphNode, R> Edge<N, R> {
    pub fn new(src: N, rel: R, dst: N) -> Self {
        Self { src, rel, dst }
    }

    /// The "other" end of the edge from the given node.
    pub fn other_node(&self, from: N) -> Option<N> {
        if from == self.src {
            Some(self.dst)
        } else if from == self.dst {
            Some(self.src)
        } else {
            None
        }
    }

    pub fn touches(&self, node: N) -> bool {
        self.src == node || self.dst == node
    }
}

impl<N: GraphNode, R: Copy> Edge<N, R> {
    /// The same edge seen from its destination.
    pub fn inverted(&self) -> Self
    where
        R: Relation<N>,
    {
        Self { src: self.dst, rel: self.rel.inverse(), dst: self.src }
    }
}
