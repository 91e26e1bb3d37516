//! # Relation Graph
//!
//! A directed multigraph over `Copy` node identities with typed,
//! invertible relations. This is the foundation every body structure is
//! built on: attachments, channels and coverage are all relation types
//! over part ids.
//!
//! ## Storage
//!
//! Each edge is stored once, in the orientation it was inserted:
//! an outgoing adjacency entry on `src` and an incoming entry on `dst`.
//! The inverse edge `(dst, rel⁻¹, src)` is derived from the incoming
//! entry on demand, so queries in either direction see the same edge and
//! removing either orientation removes it.
//!
//! ## Atomicity
//!
//! Every mutating call validates before it touches the adjacency maps.
//! A rejected call leaves the graph exactly as it was.

pub mod relation;
pub mod traversal;
pub mod subgraph;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::trace;

use crate::model::{FromValue, Property, PropertyMap, Value};
use crate::{Error, Result};

pub use relation::{Edge, GraphNode, Relation};
pub use subgraph::Subgraph;
pub use traversal::EdgeBfs;

type Adjacency<N, R> = SmallVec<[(R, N); 4]>;

// ============================================================================
// RelationGraph
// ============================================================================

/// Directed multigraph with implicit inverse edges.
#[derive(Debug, Clone)]
pub struct RelationGraph<N: GraphNode, R: Relation<N>> {
    /// node → (relation, dst) for edges stored with this node as `src`
    out: HashMap<N, Adjacency<N, R>>,
    /// node → (relation, src) for edges stored with this node as `dst`
    inc: HashMap<N, Adjacency<N, R>>,
    /// stored edge → properties
    props: HashMap<Edge<N, R>, PropertyMap>,
    edge_count: usize,
}

impl<N: GraphNode, R: Relation<N>> Default for RelationGraph<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: GraphNode, R: Relation<N>> RelationGraph<N, R> {
    pub fn new() -> Self {
        Self {
            out: HashMap::new(),
            inc: HashMap::new(),
            props: HashMap::new(),
            edge_count: 0,
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub fn contains(&self, node: N) -> bool {
        self.out.contains_key(&node)
    }

    /// Insert a node. Returns false if it was already present.
    pub fn add(&mut self, node: N) -> bool {
        if self.contains(node) {
            return false;
        }
        self.out.insert(node, SmallVec::new());
        self.inc.insert(node, SmallVec::new());
        true
    }

    /// Insert several nodes, returning how many were new.
    pub fn add_all(&mut self, nodes: impl IntoIterator<Item = N>) -> usize {
        nodes.into_iter().filter(|n| self.add(*n)).count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.out.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.out.len()
    }

    /// Number of stored edges (implicit inverses are not counted twice).
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Remove a node and every incident edge. Returns whether anything changed.
    pub fn remove(&mut self, node: N) -> bool {
        if !self.contains(node) {
            return false;
        }
        self.disconnect(node);
        self.out.remove(&node);
        self.inc.remove(&node);
        true
    }

    /// Remove every edge touching `node`, keeping the node itself.
    /// The removed edges are returned from `node`'s point of view so that
    /// wrappers can maintain derived indices.
    pub fn disconnect(&mut self, node: N) -> Vec<Edge<N, R>> {
        let edges: Vec<_> = self.edges_from(node).collect();
        for edge in &edges {
            self.remove_edge(edge.src, edge.rel, edge.dst);
        }
        edges
    }

    /// Remove every node that has no incident edge. Returns how many were removed.
    pub fn remove_bare_nodes(&mut self) -> usize {
        let bare: Vec<N> = self.nodes().filter(|n| self.degree(*n) == 0).collect();
        for node in &bare {
            self.out.remove(node);
            self.inc.remove(node);
        }
        bare.len()
    }

    /// Replace `old` with `new` in place, keeping every incident edge and
    /// its properties. Returns false if `old` is absent.
    pub fn set(&mut self, old: N, new: N) -> Result<bool> {
        if !self.contains(old) {
            return Ok(false);
        }
        if old == new {
            return Ok(true);
        }
        if self.contains(new) {
            return Err(Error::ConstraintViolation(format!(
                "cannot replace {old:?} with {new:?}: replacement is already in the graph"
            )));
        }

        let touching: Vec<(Edge<N, R>, Option<PropertyMap>)> = self
            .stored_edges_touching(old)
            .into_iter()
            .map(|e| {
                let p = self.props.get(&e).cloned();
                (e, p)
            })
            .collect();
        for (edge, _) in &touching {
            self.remove_stored(edge);
        }
        self.out.remove(&old);
        self.inc.remove(&old);
        self.add(new);

        let swap = |n: N| if n == old { new } else { n };
        for (edge, props) in touching {
            let moved = Edge::new(swap(edge.src), edge.rel, swap(edge.dst));
            self.insert_stored(moved);
            if let Some(props) = props {
                self.props.insert(moved, props);
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Edge queries
    // ========================================================================

    /// Every edge visible from `node`: stored outgoing edges plus the
    /// implicit inverse of every stored incoming edge.
    pub fn edges_from(&self, node: N) -> impl Iterator<Item = Edge<N, R>> + '_ {
        let out = self
            .out
            .get(&node)
            .into_iter()
            .flatten()
            .map(move |&(rel, dst)| Edge::new(node, rel, dst));
        let inc = self
            .inc
            .get(&node)
            .into_iter()
            .flatten()
            .map(move |&(rel, src)| Edge::new(node, rel.inverse(), src));
        out.chain(inc)
    }

    /// Edges between two nodes, seen from `a`.
    pub fn edges_between(&self, a: N, b: N) -> Vec<Edge<N, R>> {
        self.edges_from(a).filter(|e| e.dst == b).collect()
    }

    /// Neighbours of `node` over the given relations (every relation if empty).
    pub fn neighbours(&self, node: N, allowed: &[R]) -> Vec<N> {
        let mut seen = HashSet::new();
        self.edges_from(node)
            .filter(|e| allowed.is_empty() || allowed.contains(&e.rel))
            .map(|e| e.dst)
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Every stored edge, once each.
    pub fn edges(&self) -> impl Iterator<Item = Edge<N, R>> + '_ {
        self.out
            .iter()
            .flat_map(|(src, adj)| adj.iter().map(move |&(rel, dst)| Edge::new(*src, rel, dst)))
    }

    pub fn degree(&self, node: N) -> usize {
        self.out.get(&node).map_or(0, |a| a.len()) + self.inc.get(&node).map_or(0, |a| a.len())
    }

    /// Outgoing edges of one relation from `node`, counting implicit inverses.
    pub fn out_degree(&self, node: N, rel: R) -> usize {
        self.edges_from(node).filter(|e| e.rel == rel).count()
    }

    pub fn contains_edge(&self, src: N, rel: R, dst: N) -> bool {
        self.stored_orientation(src, rel, dst).is_some()
    }

    /// The orientation in which `(src, rel, dst)` is actually stored.
    fn stored_orientation(&self, src: N, rel: R, dst: N) -> Option<Edge<N, R>> {
        if self.out.get(&src).is_some_and(|a| a.contains(&(rel, dst))) {
            return Some(Edge::new(src, rel, dst));
        }
        let inv = rel.inverse();
        if self.out.get(&dst).is_some_and(|a| a.contains(&(inv, src))) {
            return Some(Edge::new(dst, inv, src));
        }
        None
    }

    fn stored_edges_touching(&self, node: N) -> Vec<Edge<N, R>> {
        let out = self
            .out
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&(rel, dst)| Edge::new(node, rel, dst));
        let inc = self
            .inc
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&(rel, src)| Edge::new(src, rel, node));
        out.chain(inc).collect()
    }

    // ========================================================================
    // Edge mutation
    // ========================================================================

    /// Insert `(src) -[rel]-> (dst)`.
    ///
    /// Returns `Ok(false)` when the edge (or its inverse) already exists.
    /// Missing endpoints are added as nodes.
    pub fn add_edge(&mut self, src: N, rel: R, dst: N) -> Result<bool> {
        if src == dst || !rel.accepts(&src, &dst) {
            return Err(Error::EndpointType {
                relation: format!("{rel:?}"),
                src: format!("{src:?}"),
                dst: format!("{dst:?}"),
            });
        }
        if self.contains_edge(src, rel, dst) {
            return Ok(false);
        }
        if let Some(max) = rel.max_permitted() {
            if self.out_degree(src, rel) >= max {
                return Err(Error::Capacity {
                    relation: format!("{rel:?}"),
                    node: format!("{src:?}"),
                    max,
                });
            }
        }
        let inv = rel.inverse();
        if let Some(max) = inv.max_permitted() {
            if self.out_degree(dst, inv) >= max {
                return Err(Error::Capacity {
                    relation: format!("{inv:?}"),
                    node: format!("{dst:?}"),
                    max,
                });
            }
        }

        self.add(src);
        self.add(dst);
        self.insert_stored(Edge::new(src, rel, dst));
        trace!(?src, ?rel, ?dst, "edge added");
        Ok(true)
    }

    /// Remove one edge, given in either orientation.
    pub fn remove_edge(&mut self, src: N, rel: R, dst: N) -> bool {
        match self.stored_orientation(src, rel, dst) {
            Some(stored) => {
                self.remove_stored(&stored);
                trace!(?src, ?rel, ?dst, "edge removed");
                true
            }
            None => false,
        }
    }

    /// Remove every edge between two nodes. Returned edges are seen from `a`.
    pub fn remove_edges_between(&mut self, a: N, b: N) -> Vec<Edge<N, R>> {
        let edges = self.edges_between(a, b);
        for e in &edges {
            self.remove_edge(e.src, e.rel, e.dst);
        }
        edges
    }

    /// Remove every outgoing edge of one relation from `node`.
    pub fn remove_edges_of(&mut self, node: N, rel: R) -> Vec<Edge<N, R>> {
        let edges: Vec<_> = self.edges_from(node).filter(|e| e.rel == rel).collect();
        for e in &edges {
            self.remove_edge(e.src, e.rel, e.dst);
        }
        edges
    }

    fn insert_stored(&mut self, edge: Edge<N, R>) {
        self.out.entry(edge.src).or_default().push((edge.rel, edge.dst));
        self.inc.entry(edge.dst).or_default().push((edge.rel, edge.src));
        self.edge_count += 1;
    }

    fn remove_stored(&mut self, edge: &Edge<N, R>) {
        if let Some(adj) = self.out.get_mut(&edge.src) {
            if let Some(i) = adj.iter().position(|x| *x == (edge.rel, edge.dst)) {
                adj.swap_remove(i);
            }
        }
        if let Some(adj) = self.inc.get_mut(&edge.dst) {
            if let Some(i) = adj.iter().position(|x| *x == (edge.rel, edge.src)) {
                adj.swap_remove(i);
            }
        }
        self.props.remove(edge);
        self.edge_count -= 1;
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Read an edge property; the declared default when the edge or the
    /// property is absent.
    pub fn property<T: FromValue + Into<Value>>(&self, src: N, rel: R, dst: N, key: &Property<T>) -> T {
        self.stored_orientation(src, rel, dst)
            .and_then(|e| self.props.get(&e))
            .map(|p| key.get(p))
            .unwrap_or_else(|| key.default_value())
    }

    pub fn set_property<T: FromValue + Into<Value>>(
        &mut self,
        src: N,
        rel: R,
        dst: N,
        key: &Property<T>,
        value: T,
    ) -> Result<()> {
        let stored = self
            .stored_orientation(src, rel, dst)
            .ok_or_else(|| Error::NotFound(format!("edge {src:?} -[{rel:?}]-> {dst:?}")))?;
        key.set(self.props.entry(stored).or_default(), value);
        Ok(())
    }

    pub fn edge_properties(&self, src: N, rel: R, dst: N) -> Option<&PropertyMap> {
        self.stored_orientation(src, rel, dst).and_then(|e| self.props.get(&e))
    }

    // ========================================================================
    // Views and traversal
    // ========================================================================

    /// Lazy filtered view; nothing is copied.
    pub fn subgraph<FN, FE>(&self, node_pred: FN, edge_pred: FE) -> Subgraph<'_, N, R, FN, FE>
    where
        FN: Fn(&N) -> bool,
        FE: Fn(&Edge<N, R>) -> bool,
    {
        Subgraph::new(self, node_pred, edge_pred)
    }

    /// Breadth-first iterator over tree edges reachable from `start`,
    /// following only `allowed` relations (every relation if empty) and
    /// edges accepted by `filter`.
    pub fn bfs<F>(&self, start: N, allowed: &[R], filter: F) -> EdgeBfs<'_, N, R, F>
    where
        F: FnMut(&Edge<N, R>) -> bool,
    {
        EdgeBfs::new(self, start, allowed, filter)
    }

    /// Every node reachable from `start` (inclusive) over allowed relations.
    pub fn reachable<F>(&self, start: N, allowed: &[R], filter: F) -> HashSet<N>
    where
        F: FnMut(&Edge<N, R>) -> bool,
    {
        let mut bfs = self.bfs(start, allowed, filter);
        bfs.by_ref().for_each(drop);
        bfs.into_visited()
    }

    /// Move `nodes` and every edge internal to them into a new graph.
    ///
    /// Edges with exactly one endpoint in `nodes` cannot live in either
    /// graph; they are removed and returned (in stored orientation).
    pub fn split_off(&mut self, nodes: &HashSet<N>) -> (Self, Vec<Edge<N, R>>) {
        let mut other = Self::new();
        let mut crossing = Vec::new();

        let mut moving: HashSet<Edge<N, R>> = HashSet::new();
        for &node in nodes {
            if self.contains(node) {
                other.add(node);
                moving.extend(self.stored_edges_touching(node));
            }
        }

        for edge in moving {
            let props = self.props.get(&edge).cloned();
            self.remove_stored(&edge);
            if nodes.contains(&edge.src) && nodes.contains(&edge.dst) {
                other.insert_stored(edge);
                if let Some(props) = props {
                    other.props.insert(edge, props);
                }
            } else {
                crossing.push(edge);
            }
        }

        for node in nodes {
            self.out.remove(node);
            self.inc.remove(node);
        }
        (other, crossing)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Rel {
        Knows,
        Parent,
        Child,
        /// At most one spouse.
        Spouse,
    }

    impl Relation<u32> for Rel {
        fn is_bidirectional(&self) -> bool {
            matches!(self, Rel::Knows | Rel::Spouse)
        }
        fn inverse(&self) -> Self {
            match self {
                Rel::Parent => Rel::Child,
                Rel::Child => Rel::Parent,
                other => *other,
            }
        }
        fn max_permitted(&self) -> Option<usize> {
            match self {
                Rel::Spouse => Some(1),
                _ => None,
            }
        }
        fn accepts(&self, src: &u32, _dst: &u32) -> bool {
            // Node 0 is reserved and never related.
            *src != 0
        }
    }

    #[test]
    fn test_inverse_is_queryable() {
        let mut g = RelationGraph::new();
        assert!(g.add_edge(1, Rel::Parent, 2).unwrap());
        assert!(g.contains_edge(2, Rel::Child, 1));
        assert!(!g.contains_edge(2, Rel::Parent, 1));
        assert_eq!(g.edge_count(), 1);

        // Re-adding through the inverse is a no-op.
        assert!(!g.add_edge(2, Rel::Child, 1).unwrap());
        assert_eq!(g.edge_count(), 1);

        assert!(g.remove_edge(2, Rel::Child, 1));
        assert!(!g.contains_edge(1, Rel::Parent, 2));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_capacity_counts_both_sides() {
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Spouse, 2).unwrap();
        assert!(matches!(g.add_edge(1, Rel::Spouse, 3), Err(Error::Capacity { .. })));
        // Node 2 already has a spouse through the implicit inverse.
        assert!(matches!(g.add_edge(4, Rel::Spouse, 2), Err(Error::Capacity { .. })));
        assert!(!g.contains(3));
        assert!(!g.contains(4));
    }

    #[test]
    fn test_endpoint_rejection_leaves_graph_untouched() {
        let mut g: RelationGraph<u32, Rel> = RelationGraph::new();
        assert!(matches!(g.add_edge(0, Rel::Knows, 1), Err(Error::EndpointType { .. })));
        assert!(matches!(g.add_edge(5, Rel::Knows, 5), Err(Error::EndpointType { .. })));
        assert!(g.is_empty());
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Knows, 2).unwrap();
        g.add_edge(2, Rel::Knows, 3).unwrap();
        g.add_edge(3, Rel::Parent, 1).unwrap();
        assert!(g.remove(2));
        assert!(!g.remove(2));
        assert_eq!(g.edge_count(), 1);
        assert!(g.contains_edge(1, Rel::Child, 3));
    }

    #[test]
    fn test_remove_bare_nodes() {
        let mut g = RelationGraph::new();
        g.add_all([7, 8, 9]);
        g.add_edge(1, Rel::Knows, 2).unwrap();
        assert_eq!(g.remove_bare_nodes(), 3);
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn test_set_preserves_edges_and_properties() {
        const WEIGHT: Property<f64> = Property::new("weight", || 0.0);
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Parent, 2).unwrap();
        g.add_edge(3, Rel::Knows, 1).unwrap();
        g.set_property(1, Rel::Parent, 2, &WEIGHT, 0.75).unwrap();

        assert!(g.set(1, 10).unwrap());
        assert!(!g.contains(1));
        assert!(g.contains_edge(10, Rel::Parent, 2));
        assert!(g.contains_edge(10, Rel::Knows, 3));
        assert_eq!(g.property(2, Rel::Child, 10, &WEIGHT), 0.75);
        assert!(g.set(2, 3).is_err());
    }

    #[test]
    fn test_property_default() {
        const WEIGHT: Property<f64> = Property::new("weight", || 0.5);
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Knows, 2).unwrap();
        assert_eq!(g.property(2, Rel::Knows, 1, &WEIGHT), 0.5);
        assert!(g.set_property(1, Rel::Knows, 3, &WEIGHT, 1.0).is_err());
    }

    #[test]
    fn test_bfs_order_and_filter() {
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Knows, 2).unwrap();
        g.add_edge(1, Rel::Knows, 3).unwrap();
        g.add_edge(2, Rel::Knows, 4).unwrap();
        g.add_edge(4, Rel::Parent, 5).unwrap();

        let edges: Vec<_> = g.bfs(1, &[Rel::Knows], |_| true).collect();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], Edge::new(2, Rel::Knows, 4));

        let all = g.reachable(1, &[], |_| true);
        assert_eq!(all.len(), 5);

        let blocked = g.reachable(1, &[], |e| e.dst != 2);
        assert_eq!(blocked.len(), 2);
    }

    #[test]
    fn test_split_off_moves_internal_edges() {
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Knows, 2).unwrap();
        g.add_edge(2, Rel::Knows, 3).unwrap();
        g.add_edge(3, Rel::Parent, 4).unwrap();

        let moved: HashSet<u32> = [3, 4].into_iter().collect();
        let (other, crossing) = g.split_off(&moved);
        assert_eq!(crossing.len(), 1);
        assert_eq!(other.node_count(), 2);
        assert!(other.contains_edge(4, Rel::Child, 3));
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_subgraph_view() {
        let mut g = RelationGraph::new();
        g.add_edge(1, Rel::Knows, 2).unwrap();
        g.add_edge(2, Rel::Parent, 3).unwrap();
        let view = g.subgraph(|n| *n != 3, |e| e.rel == Rel::Knows);
        assert_eq!(view.node_count(), 2);
        assert_eq!(view.edges().count(), 1);
        assert!(!view.contains(3));
    }
}
