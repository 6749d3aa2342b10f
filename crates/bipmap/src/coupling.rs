//! Device coupling map in global qubit numbering.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{RoutingError, RoutingResult};
use crate::topology::Topology;

/// Target device coupling map.
///
/// The coupling map defines which pairs of physical qubits can interact
/// with two-qubit gates. Edges are bidirectional. Routing works on a
/// [`Topology`] obtained with [`reduce`](Self::reduce), which renumbers the
/// active qubits densely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CouplingEdges", into = "CouplingEdges")]
pub struct CouplingMap {
    /// List of connected qubit pairs.
    edges: Vec<(u32, u32)>,
    /// Number of physical qubits.
    num_qubits: u32,
    /// Adjacency list for fast lookup.
    adjacency: FxHashMap<u32, Vec<u32>>,
}

/// Serialized form of a [`CouplingMap`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CouplingEdges {
    num_qubits: u32,
    edges: Vec<(u32, u32)>,
}

impl From<CouplingEdges> for CouplingMap {
    fn from(raw: CouplingEdges) -> Self {
        let mut map = CouplingMap::new(raw.num_qubits);
        for (a, b) in raw.edges {
            map.add_edge(a, b);
        }
        map
    }
}

impl From<CouplingMap> for CouplingEdges {
    fn from(map: CouplingMap) -> Self {
        CouplingEdges {
            num_qubits: map.num_qubits,
            edges: map.edges,
        }
    }
}

impl CouplingMap {
    /// Create a new coupling map with the given number of qubits and no edges.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            edges: vec![],
            num_qubits,
            adjacency: FxHashMap::default(),
        }
    }

    /// Create a coupling map from an edge list.
    ///
    /// The qubit count is one past the largest index mentioned.
    pub fn from_edges(edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let edges: Vec<_> = edges.into_iter().collect();
        let n = edges.iter().map(|&(a, b)| a.max(b) + 1).max().unwrap_or(0);
        let mut map = Self::new(n);
        for (a, b) in edges {
            map.add_edge(a, b);
        }
        map
    }

    /// Add an edge between two qubits (bidirectional).
    ///
    /// Duplicate edges (including reversed pairs) are silently ignored. The
    /// qubit count grows to cover both endpoints.
    pub fn add_edge(&mut self, q1: u32, q2: u32) {
        if self.is_connected(q1, q2) {
            return;
        }
        self.num_qubits = self.num_qubits.max(q1.max(q2) + 1);
        self.edges.push((q1, q2));
        self.adjacency.entry(q1).or_default().push(q2);
        if q1 != q2 {
            self.adjacency.entry(q2).or_default().push(q1);
        }
    }

    /// Check if two qubits are directly connected.
    #[inline]
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(&q1)
            .is_some_and(|neighbors| neighbors.contains(&q2))
    }

    /// Get the number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Get the coupling edges.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Get neighbors of a qubit.
    pub fn neighbors(&self, qubit: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency
            .get(&qubit)
            .map(|v| v.iter().copied())
            .into_iter()
            .flatten()
    }

    /// Create a linear coupling map (0-1-2-3-...).
    pub fn linear(n: u32) -> Self {
        let mut map = Self::new(n);
        for i in 0..n.saturating_sub(1) {
            map.add_edge(i, i + 1);
        }
        map
    }

    /// Create a ring (0-1-...-(n-1)-0).
    pub fn ring(n: u32) -> Self {
        let mut map = Self::linear(n);
        if n > 2 {
            map.add_edge(n - 1, 0);
        }
        map
    }

    /// Create a fully connected coupling map.
    pub fn full(n: u32) -> Self {
        let mut map = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                map.add_edge(i, j);
            }
        }
        map
    }

    /// Create a star topology (center qubit connected to all others).
    pub fn star(n: u32) -> Self {
        let mut map = Self::new(n);
        for i in 1..n {
            map.add_edge(0, i);
        }
        map
    }

    /// Create a `rows × cols` grid with row-major numbering.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut map = Self::new(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                if c + 1 < cols {
                    map.add_edge(q, q + 1);
                }
                if r + 1 < rows {
                    map.add_edge(q, q + cols);
                }
            }
        }
        map
    }

    /// Restrict the map to `qubit_subset` and renumber it densely.
    ///
    /// `qubit_subset[local]` is the global index of local qubit `local`;
    /// `None` keeps every qubit in order. Fails if the subset is empty,
    /// repeats or exceeds the device's qubits, or if the induced graph is
    /// disconnected.
    pub fn reduce(&self, qubit_subset: Option<&[u32]>) -> RoutingResult<Topology> {
        let global: Vec<u32> = match qubit_subset {
            Some(subset) => subset.to_vec(),
            None => (0..self.num_qubits).collect(),
        };
        if global.is_empty() {
            return Err(RoutingError::Configuration(
                "qubit subset selects no physical qubits".into(),
            ));
        }

        let mut local_of: FxHashMap<u32, usize> = FxHashMap::default();
        for (local, &g) in global.iter().enumerate() {
            if g >= self.num_qubits {
                return Err(RoutingError::Configuration(format!(
                    "qubit subset entry {g} exceeds device size {}",
                    self.num_qubits
                )));
            }
            if local_of.insert(g, local).is_some() {
                return Err(RoutingError::Configuration(format!(
                    "qubit subset lists physical qubit {g} twice"
                )));
            }
        }

        let mut seen = FxHashSet::default();
        let mut local_edges = Vec::new();
        for &(a, b) in &self.edges {
            if a == b {
                continue;
            }
            if let (Some(&la), Some(&lb)) = (local_of.get(&a), local_of.get(&b)) {
                if seen.insert((la.min(lb), la.max(lb))) {
                    local_edges.push((la, lb));
                }
            }
        }

        Topology::new(global.len(), local_edges).map(|t| t.with_global_qubits(global))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_and_ring() {
        let line = CouplingMap::linear(4);
        assert_eq!(line.edges().len(), 3);
        assert!(line.is_connected(2, 1));
        assert!(!line.is_connected(0, 3));

        let ring = CouplingMap::ring(4);
        assert!(ring.is_connected(3, 0));
        assert_eq!(ring.neighbors(0).count(), 2);
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let map = CouplingMap::from_edges([(0, 1), (1, 0), (1, 2), (0, 1)]);
        assert_eq!(map.num_qubits(), 3);
        assert_eq!(map.edges().len(), 2);
    }

    #[test]
    fn test_grid() {
        let map = CouplingMap::grid(2, 3);
        assert_eq!(map.num_qubits(), 6);
        assert_eq!(map.edges().len(), 7);
        assert!(map.is_connected(1, 4));
        assert!(!map.is_connected(2, 3));
    }

    #[test]
    fn test_reduce_subset() {
        let map = CouplingMap::linear(5);
        let topo = map.reduce(Some(&[3, 2, 4])).unwrap();
        assert_eq!(topo.num_qubits(), 3);
        assert_eq!(topo.global_qubit(0), 3);
        // Local 0 (global 3) neighbors local 1 (global 2) and local 2 (global 4).
        assert_eq!(topo.neighbors(0), &[1, 2]);
        assert_eq!(topo.distance(1, 2), 2);
    }

    #[test]
    fn test_reduce_disconnected_subset() {
        let map = CouplingMap::linear(5);
        let err = map.reduce(Some(&[0, 1, 3])).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
    }

    #[test]
    fn test_reduce_bad_subset() {
        let map = CouplingMap::linear(3);
        assert!(map.reduce(Some(&[0, 7])).is_err());
        assert!(map.reduce(Some(&[0, 0])).is_err());
        assert!(map.reduce(Some(&[])).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let map = CouplingMap::star(4);
        let json = serde_json::to_string(&map).unwrap();
        let back: CouplingMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.edges(), map.edges());
        assert!(back.is_connected(0, 3));
    }
}
