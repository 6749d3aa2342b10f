//! Dense local connectivity graph used by the model builder.
//!
//! A [`Topology`] numbers its physical qubits `0..n`. It precomputes
//! everything the builder queries per variable: the sorted arc list, the
//! neighbor lists, all-pairs hop distances and per-arc gate fidelities.

use std::collections::VecDeque;

use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use rustc_hash::FxHashMap;

use crate::error::{RoutingError, RoutingResult};

/// Base two-qubit gate fidelity of an arc without calibration data.
pub const DEFAULT_ARC_FIDELITY: f64 = 0.99;

/// Connected, symmetric connectivity graph over local physical qubits.
#[derive(Debug, Clone)]
pub struct Topology {
    num_qubits: usize,
    /// Global index of each local qubit.
    global: Vec<u32>,
    /// Ordered pairs `(i, j)` for both directions of every edge, sorted.
    arcs: Vec<(usize, usize)>,
    arc_index: FxHashMap<(usize, usize), usize>,
    /// Base fidelity per arc, parallel to `arcs`.
    fidelity: Vec<f64>,
    neighbors: Vec<Vec<usize>>,
    /// `dist[i][j]` in hops.
    dist: Vec<Vec<usize>>,
}

impl Topology {
    /// Build a topology over `num_qubits` local qubits.
    ///
    /// The edge list is symmetrized and deduplicated. Self loops, indices
    /// out of range and disconnected graphs are rejected.
    pub fn new(
        num_qubits: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> RoutingResult<Self> {
        if num_qubits == 0 {
            return Err(RoutingError::Configuration(
                "topology has no physical qubits".into(),
            ));
        }

        let mut neighbors = vec![Vec::new(); num_qubits];
        for (i, j) in edges {
            if i >= num_qubits || j >= num_qubits {
                return Err(RoutingError::Configuration(format!(
                    "edge ({i}, {j}) references a qubit outside 0..{num_qubits}"
                )));
            }
            if i == j {
                return Err(RoutingError::Configuration(format!(
                    "self loop on physical qubit {i}"
                )));
            }
            neighbors[i].push(j);
            neighbors[j].push(i);
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        let mut graph = UnGraph::<(), ()>::with_capacity(num_qubits, 0);
        for _ in 0..num_qubits {
            graph.add_node(());
        }
        for (i, ns) in neighbors.iter().enumerate() {
            graph.extend_with_edges(ns.iter().filter(|&&j| i < j).map(|&j| (i as u32, j as u32)));
        }
        let components = connected_components(&graph);
        if components != 1 {
            return Err(RoutingError::Configuration(format!(
                "coupling graph over {num_qubits} qubits is disconnected ({components} components)"
            )));
        }

        let arcs: Vec<(usize, usize)> = neighbors
            .iter()
            .enumerate()
            .flat_map(|(i, ns)| ns.iter().map(move |&j| (i, j)))
            .collect();
        let arc_index = arcs.iter().enumerate().map(|(k, &a)| (a, k)).collect();
        let dist = all_pairs_distances(&neighbors);

        Ok(Self {
            num_qubits,
            global: (0..num_qubits as u32).collect(),
            fidelity: vec![DEFAULT_ARC_FIDELITY; arcs.len()],
            arcs,
            arc_index,
            neighbors,
            dist,
        })
    }

    /// Replace the local→global numbering.
    pub(crate) fn with_global_qubits(mut self, global: Vec<u32>) -> Self {
        debug_assert_eq!(global.len(), self.num_qubits);
        self.global = global;
        self
    }

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Global device index of local qubit `local`.
    #[inline]
    pub fn global_qubit(&self, local: usize) -> u32 {
        self.global[local]
    }

    /// Global device indices in local order.
    pub fn global_qubits(&self) -> &[u32] {
        &self.global
    }

    /// All arcs, sorted.
    pub fn arcs(&self) -> &[(usize, usize)] {
        &self.arcs
    }

    /// Edges as `(i, j)` with `i < j`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.arcs.iter().copied().filter(|&(i, j)| i < j)
    }

    /// Sorted neighbors of `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Whether `(i, j)` is an arc.
    #[inline]
    pub fn is_arc(&self, i: usize, j: usize) -> bool {
        self.arc_index.contains_key(&(i, j))
    }

    /// Hop distance between `i` and `j`.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> usize {
        self.dist[i][j]
    }

    /// Base fidelity of arc `(i, j)`, if it is an arc.
    pub fn arc_fidelity(&self, i: usize, j: usize) -> Option<f64> {
        self.arc_index.get(&(i, j)).map(|&k| self.fidelity[k])
    }

    /// Set the base fidelity of both directions of edge `{i, j}`.
    pub fn set_arc_fidelity(&mut self, i: usize, j: usize, fidelity: f64) -> RoutingResult<()> {
        if !(fidelity > 0.0 && fidelity <= 1.0) {
            return Err(RoutingError::Configuration(format!(
                "fidelity {fidelity} of arc ({i}, {j}) is outside (0, 1]"
            )));
        }
        for arc in [(i, j), (j, i)] {
            let k = *self.arc_index.get(&arc).ok_or_else(|| {
                RoutingError::Configuration(format!("({i}, {j}) is not an edge of the topology"))
            })?;
            self.fidelity[k] = fidelity;
        }
        Ok(())
    }

    /// Geometric mean of the arc fidelities.
    ///
    /// Returns 1.0 for a topology without arcs.
    pub fn average_fidelity(&self) -> f64 {
        if self.fidelity.is_empty() {
            return 1.0;
        }
        let mean_log = self.fidelity.iter().map(|f| f.ln()).sum::<f64>() / self.fidelity.len() as f64;
        mean_log.exp()
    }

    /// Pairs `(i, j)`, `i ≠ j`, at hop distance at most `horizon`.
    pub fn long_arcs(&self, horizon: usize) -> LongArcs {
        let targets = (0..self.num_qubits)
            .map(|i| {
                (0..self.num_qubits)
                    .filter(|&j| j != i && self.dist[i][j] <= horizon)
                    .map(|j| (j, self.dist[i][j]))
                    .collect()
            })
            .collect();
        LongArcs { horizon, targets }
    }
}

/// Approximate connectivity: every pair within a hop horizon.
///
/// The relation is symmetric, so `targets(i)` also lists the sources of arcs
/// ending at `i`.
#[derive(Debug, Clone)]
pub struct LongArcs {
    horizon: usize,
    /// `(j, distance)` for each `i`, sorted by `j`.
    targets: Vec<Vec<(usize, usize)>>,
}

impl LongArcs {
    /// Hop horizon used to build the set.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Reachable qubits from `i` with their distance.
    pub fn targets(&self, i: usize) -> &[(usize, usize)] {
        &self.targets[i]
    }

    /// Total number of long arcs.
    pub fn len(&self) -> usize {
        self.targets.iter().map(Vec::len).sum()
    }

    /// Whether the set holds no arcs.
    pub fn is_empty(&self) -> bool {
        self.targets.iter().all(Vec::is_empty)
    }
}

/// BFS from every node.
fn all_pairs_distances(neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = neighbors.len();
    let mut dist = vec![vec![usize::MAX; n]; n];
    for (src, row) in dist.iter_mut().enumerate() {
        row[src] = 0;
        let mut queue = VecDeque::from([src]);
        while let Some(current) = queue.pop_front() {
            for &nb in &neighbors[current] {
                if row[nb] == usize::MAX {
                    row[nb] = row[current] + 1;
                    queue.push_back(nb);
                }
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Topology {
        Topology::new(n, (0..n - 1).map(|i| (i, i + 1))).unwrap()
    }

    #[test]
    fn test_arcs_symmetric_and_sorted() {
        let topo = Topology::new(3, [(1, 0), (2, 1), (0, 1)]).unwrap();
        assert_eq!(topo.arcs(), &[(0, 1), (1, 0), (1, 2), (2, 1)]);
        assert_eq!(topo.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
        assert!(topo.is_arc(2, 1));
        assert!(!topo.is_arc(0, 2));
    }

    #[test]
    fn test_distances() {
        let topo = line(5);
        assert_eq!(topo.distance(0, 4), 4);
        assert_eq!(topo.distance(3, 1), 2);
        assert_eq!(topo.distance(2, 2), 0);
    }

    #[test]
    fn test_disconnected_rejected() {
        let err = Topology::new(4, [(0, 1), (2, 3)]).unwrap_err();
        assert!(matches!(err, RoutingError::Configuration(_)));
        // An isolated trailing qubit is missing from the edge list entirely.
        assert!(Topology::new(3, [(0, 1)]).is_err());
        assert!(Topology::new(1, []).is_ok());
    }

    #[test]
    fn test_invalid_edges_rejected() {
        assert!(Topology::new(2, [(0, 0)]).is_err());
        assert!(Topology::new(2, [(0, 2)]).is_err());
        assert!(Topology::new(0, []).is_err());
    }

    #[test]
    fn test_fidelity() {
        let mut topo = line(3);
        assert_eq!(topo.arc_fidelity(0, 1), Some(DEFAULT_ARC_FIDELITY));
        topo.set_arc_fidelity(0, 1, 0.9).unwrap();
        assert_eq!(topo.arc_fidelity(1, 0), Some(0.9));
        assert!(topo.set_arc_fidelity(0, 2, 0.9).is_err());
        assert!(topo.set_arc_fidelity(0, 1, 0.0).is_err());

        topo.set_arc_fidelity(1, 2, 0.4).unwrap();
        assert!((topo.average_fidelity() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_long_arcs() {
        let topo = line(4);
        let long = topo.long_arcs(2);
        assert_eq!(long.targets(0), &[(1, 1), (2, 2)]);
        assert_eq!(long.targets(1), &[(0, 1), (2, 1), (3, 2)]);
        assert_eq!(long.len(), 10);
        assert!(topo.long_arcs(0).is_empty());
    }
}
