//! Lazy filtered views over a relation graph.

use super::{Edge, GraphNode, Relation, RelationGraph};

/// A read-only view of the nodes and edges passing two predicates.
/// An edge is visible only if both its endpoints are.
pub struct Subgraph<'g, N: GraphNode, R: Relation<N>, FN, FE> {
    graph: &'g RelationGraph<N, R>,
    node_pred: FN,
    edge_pred: FE,
}

impl<'g, N, R, FN, FE> Subgraph<'g, N, R, FN, FE>
where
    N: GraphNode,
    R: Relation<N>,
    FN: Fn(&N) -> bool,
    FE: Fn(&Edge<N, R>) -> bool,
{
    pub(crate) fn new(graph: &'g RelationGraph<N, R>, node_pred: FN, edge_pred: FE) -> Self {
        Self { graph, node_pred, edge_pred }
    }

    pub fn contains(&self, node: N) -> bool {
        self.graph.contains(node) && (self.node_pred)(&node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.graph.nodes().filter(|n| (self.node_pred)(n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    fn visible(&self, edge: &Edge<N, R>) -> bool {
        (self.node_pred)(&edge.src) && (self.node_pred)(&edge.dst) && (self.edge_pred)(edge)
    }

    /// Stored edges in the view, once each.
    pub fn edges(&self) -> impl Iterator<Item = Edge<N, R>> + '_ {
        self.graph.edges().filter(|e| self.visible(e))
    }

    pub fn edges_from(&self, node: N) -> impl Iterator<Item = Edge<N, R>> + '_ {
        self.graph.edges_from(node).filter(|e| self.visible(e))
    }
}
