//! Breadth-first edge traversal.

use std::collections::VecDeque;

use hashbrown::HashSet;
use smallvec::SmallVec;

use super::{Edge, GraphNode, Relation, RelationGraph};

/// Lazy BFS over a [`RelationGraph`], yielding the edge by which each
/// node was first discovered.
///
/// The iterator is finite: every node is entered at most once.
/// [`restart`](Self::restart) rewinds it to the start node so the same
/// traversal can be replayed after the graph changed.
pub struct EdgeBfs<'g, N: GraphNode, R: Relation<N>, F> {
    graph: &'g RelationGraph<N, R>,
    start: N,
    allowed: SmallVec<[R; 4]>,
    filter: F,
    visited: HashSet<N>,
    queue: VecDeque<N>,
    pending: VecDeque<Edge<N, R>>,
}

impl<'g, N, R, F> EdgeBfs<'g, N, R, F>
where
    N: GraphNode,
    R: Relation<N>,
    F: FnMut(&Edge<N, R>) -> bool,
{
    pub(crate) fn new(graph: &'g RelationGraph<N, R>, start: N, allowed: &[R], filter: F) -> Self {
        let mut bfs = Self {
            graph,
            start,
            allowed: allowed.iter().copied().collect(),
            filter,
            visited: HashSet::new(),
            queue: VecDeque::new(),
            pending: VecDeque::new(),
        };
        bfs.restart();
        bfs
    }

    pub fn restart(&mut self) {
        self.visited.clear();
        self.queue.clear();
        self.pending.clear();
        if self.graph.contains(self.start) {
            self.visited.insert(self.start);
            self.queue.push_back(self.start);
        }
    }

    /// Nodes discovered so far, the start node included.
    pub fn visited(&self) -> &HashSet<N> {
        &self.visited
    }

    pub fn into_visited(self) -> HashSet<N> {
        self.visited
    }
}

impl<N, R, F> Iterator for EdgeBfs<'_, N, R, F>
where
    N: GraphNode,
    R: Relation<N>,
    F: FnMut(&Edge<N, R>) -> bool,
{
    type Item = Edge<N, R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(edge) = self.pending.pop_front() {
                return Some(edge);
            }
            let node = self.queue.pop_front()?;
            let graph = self.graph;
            for edge in graph.edges_from(node) {
                if !self.allowed.is_empty() && !self.allowed.contains(&edge.rel) {
                    continue;
                }
                if self.visited.contains(&edge.dst) || !(self.filter)(&edge) {
                    continue;
                }
                self.visited.insert(edge.dst);
                self.queue.push_back(edge.dst);
                self.pending.push_back(edge);
            }
        }
    }
}
