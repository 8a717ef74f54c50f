//! Spatial network of sites.
//!
//! A [`Network`] maps each vertex to the set of its neighbors. Edges are
//! directed in storage, but every constructor in this module adds them in
//! both directions, so connectivity is tested as if the graph were
//! undirected.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;

use crate::point::Point;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network<T: Ord + Clone> {
    adjacency: BTreeMap<T, BTreeSet<T>>,
}

impl<T: Ord + Clone> Default for Network<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> Network<T> {
    pub fn new() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }

    /// Number of vertices.
    pub fn order(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of directed edges in the whole network.
    ///
    /// Symmetric edges count twice.
    pub fn size(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    /// Number of outgoing edges of `v`, or `0` if `v` is absent.
    pub fn degree(&self, v: &T) -> usize {
        self.adjacency.get(v).map_or(0, BTreeSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
    }

    pub fn has_vertex(&self, v: &T) -> bool {
        self.adjacency.contains_key(v)
    }

    pub fn has_edge(&self, from: &T, to: &T) -> bool {
        self.has_vertex(to) && self.adjacency.get(from).is_some_and(|ns| ns.contains(to))
    }

    /// Adds an isolated vertex.
    ///
    /// ### Returns
    /// `true` if the vertex was not present before.
    pub fn add_vertex(&mut self, v: T) -> bool {
        if self.adjacency.contains_key(&v) {
            false
        } else {
            self.adjacency.insert(v, BTreeSet::new());
            true
        }
    }

    /// Adds the directed edge `from -> to`.
    ///
    /// Nothing happens unless both endpoints are vertices of the network.
    ///
    /// ### Returns
    /// The number of edges actually added (`0` or `1`).
    pub fn add_edge(&mut self, from: &T, to: &T) -> usize {
        if !self.adjacency.contains_key(to) {
            return 0;
        }
        match self.adjacency.get_mut(from) {
            Some(ns) => usize::from(ns.insert(to.clone())),
            None => 0,
        }
    }

    /// Adds both `a -> b` and `b -> a`.
    ///
    /// ### Returns
    /// The number of edges actually added (`0`, `1` or `2`).
    pub fn add_edges(&mut self, a: &T, b: &T) -> usize {
        self.add_edge(a, b) + self.add_edge(b, a)
    }

    /// Returns the neighbor set of `v`.
    ///
    /// ### Panics
    /// Panics if `v` is not a vertex of the network.
    pub fn neighbors(&self, v: &T) -> &BTreeSet<T> {
        &self.adjacency[v]
    }

    /// Returns the neighbor set of `v`, or `None` if `v` is absent.
    pub fn get_neighbors(&self, v: &T) -> Option<&BTreeSet<T>> {
        self.adjacency.get(v)
    }

    /// Iterates the vertices in their key order.
    pub fn vertices(&self) -> impl Iterator<Item = &T> {
        self.adjacency.keys()
    }

    /// Iterates `(vertex, neighbors)` pairs in vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &BTreeSet<T>)> {
        self.adjacency.iter()
    }

    /// Returns a uniformly chosen vertex, or `None` for an empty network.
    pub fn random_vertex(&self, rng: &mut impl Rng) -> Option<&T> {
        if self.adjacency.is_empty() {
            return None;
        }
        let k = rng.random_range(0..self.adjacency.len());
        self.adjacency.keys().nth(k)
    }

    /// Returns `true` if every vertex is reachable from any other.
    ///
    /// A single flood fill is run from the first vertex and the size of the
    /// reached set is compared against the vertex count. The empty network
    /// is considered connected.
    pub fn is_connected(&self) -> bool {
        let Some(start) = self.adjacency.keys().next() else {
            return true;
        };

        let mut reached: BTreeSet<&T> = BTreeSet::new();
        let mut stack = vec![start];
        reached.insert(start);

        while let Some(v) = stack.pop() {
            for n in &self.adjacency[v] {
                if reached.insert(n) {
                    stack.push(n);
                }
            }
        }

        reached.len() == self.adjacency.len()
    }
}

impl Network<Point> {
    /// Destroys all vertices and builds a random geometric graph.
    ///
    /// `order` points are drawn uniformly in the unit square (a duplicate
    /// draw is discarded and redrawn, so the result always has exactly
    /// `order` vertices). Every unordered pair of distinct points closer
    /// than `radius` is joined by a symmetric edge.
    ///
    /// ### Parameters
    /// - `order` - Number of sites.
    /// - `radius` - Connection threshold (strict).
    /// - `rng` - Source of uniform draws; the result is deterministic for a
    ///   given stream.
    pub fn random_geometric(&mut self, order: usize, radius: f64, rng: &mut impl Rng) {
        self.adjacency.clear();
        while self.adjacency.len() < order {
            let x: f64 = rng.random();
            let y: f64 = rng.random();
            self.add_vertex(Point::new(x, y));
        }

        let points: Vec<Point> = self.adjacency.keys().copied().collect();
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                if a.distance_to(b) < radius {
                    self.add_edges(a, b);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn path(n: usize) -> Network<usize> {
        let mut net = Network::new();
        for i in 0..n {
            net.add_vertex(i);
        }
        for i in 1..n {
            net.add_edges(&(i - 1), &i);
        }
        net
    }

    #[test]
    fn add_edge_requires_both_endpoints() {
        let mut net = Network::new();
        net.add_vertex(1);
        assert_eq!(net.add_edge(&1, &2), 0);
        assert_eq!(net.add_edge(&2, &1), 0);
        net.add_vertex(2);
        assert_eq!(net.add_edges(&1, &2), 2);
        assert_eq!(net.add_edges(&1, &2), 0);
        assert!(net.has_edge(&1, &2));
        assert!(net.has_edge(&2, &1));
        assert_eq!(net.size(), 2);
        assert_eq!(net.order(), 2);
    }

    #[test]
    fn add_vertex_is_idempotent() {
        let mut net = Network::new();
        assert!(net.add_vertex('a'));
        assert!(!net.add_vertex('a'));
        assert_eq!(net.order(), 1);
    }

    #[test]
    fn path_is_connected_and_split_path_is_not() {
        assert!(path(5).is_connected());

        let mut net = path(5);
        net.add_vertex(99);
        assert!(!net.is_connected());
    }

    #[test]
    fn empty_and_single_vertex_are_connected() {
        let net: Network<usize> = Network::new();
        assert!(net.is_connected());
        assert!(path(1).is_connected());
    }

    #[test]
    fn neighbors_returns_adjacency() {
        let net = path(3);
        let ns: Vec<usize> = net.neighbors(&1).iter().copied().collect();
        assert_eq!(ns, vec![0, 2]);
        assert!(net.get_neighbors(&7).is_none());
        assert_eq!(net.degree(&0), 1);
    }

    #[test]
    fn random_vertex_on_empty_network_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let net: Network<usize> = Network::new();
        assert!(net.random_vertex(&mut rng).is_none());

        let net = path(4);
        for _ in 0..20 {
            let v = *net.random_vertex(&mut rng).unwrap();
            assert!(v < 4);
        }
    }

    #[test]
    fn random_geometric_has_requested_order_and_symmetric_edges() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut net = Network::new();
        net.random_geometric(64, 0.2, &mut rng);

        assert_eq!(net.order(), 64);
        for (v, ns) in net.iter() {
            assert!(!ns.contains(v), "no self-loops");
            for n in ns {
                assert!(net.has_edge(n, v));
                assert!(v.distance_to(n) < 0.2);
            }
        }
        assert_eq!(net.size() % 2, 0);
    }

    #[test]
    fn random_geometric_is_deterministic_and_clears_prior_state() {
        let mut a = Network::new();
        let mut b = Network::new();
        a.random_geometric(10, 0.5, &mut StdRng::seed_from_u64(7));
        b.random_geometric(30, 0.5, &mut StdRng::seed_from_u64(3));
        b.random_geometric(10, 0.5, &mut StdRng::seed_from_u64(7));

        let va: Vec<Point> = a.vertices().copied().collect();
        let vb: Vec<Point> = b.vertices().copied().collect();
        assert_eq!(va, vb);
        assert_eq!(a.size(), b.size());
    }

    #[test]
    fn full_radius_gives_complete_graph() {
        let mut net = Network::new();
        net.random_geometric(8, 2.0, &mut StdRng::seed_from_u64(5));
        assert_eq!(net.size(), 8 * 7);
        assert!(net.is_connected());
    }
}
