//! Logical qubit identifiers and logical→physical layouts.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Identifier of a logical (circuit) qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QubitId(pub u32);

impl QubitId {
    /// Dense index of this qubit.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// A complete mapping of logical qubits `0..n` onto physical qubits.
///
/// Physical qubits use the device's global numbering, so they need not be
/// contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Physical qubit of each logical qubit, indexed by logical index.
    logical_to_physical: Vec<u32>,
    /// Inverse map.
    #[serde(skip)]
    physical_to_logical: FxHashMap<u32, QubitId>,
}

impl Layout {
    /// Build a layout from the physical qubit of each logical qubit.
    ///
    /// Returns `None` if two logical qubits share a physical qubit.
    pub fn from_physical(physical: Vec<u32>) -> Option<Self> {
        let mut physical_to_logical = FxHashMap::default();
        for (l, &p) in physical.iter().enumerate() {
            if physical_to_logical.insert(p, QubitId(l as u32)).is_some() {
                return None;
            }
        }
        Some(Self {
            logical_to_physical: physical,
            physical_to_logical,
        })
    }

    /// Create a trivial layout (logical qubit i -> physical qubit i).
    pub fn trivial(num_qubits: u32) -> Self {
        Self {
            logical_to_physical: (0..num_qubits).collect(),
            physical_to_logical: (0..num_qubits).map(|i| (i, QubitId(i))).collect(),
        }
    }

    /// Get the physical qubit for a logical qubit.
    pub fn get_physical(&self, logical: QubitId) -> Option<u32> {
        self.logical_to_physical.get(logical.index()).copied()
    }

    /// Get the logical qubit for a physical qubit.
    pub fn get_logical(&self, physical: u32) -> Option<QubitId> {
        self.physical_to_logical.get(&physical).copied()
    }

    /// Swap the contents of two physical qubits.
    ///
    /// A physical qubit that holds no logical qubit is treated as empty.
    pub fn swap(&mut self, p1: u32, p2: u32) {
        let l1 = self.physical_to_logical.remove(&p1);
        let l2 = self.physical_to_logical.remove(&p2);
        if let Some(l1) = l1 {
            self.logical_to_physical[l1.index()] = p2;
            self.physical_to_logical.insert(p2, l1);
        }
        if let Some(l2) = l2 {
            self.logical_to_physical[l2.index()] = p1;
            self.physical_to_logical.insert(p1, l2);
        }
    }

    /// Number of mapped logical qubits.
    pub fn len(&self) -> usize {
        self.logical_to_physical.len()
    }

    /// Whether the layout maps no qubits.
    pub fn is_empty(&self) -> bool {
        self.logical_to_physical.is_empty()
    }

    /// Iterate over (logical, physical) pairs in logical order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.logical_to_physical
            .iter()
            .enumerate()
            .map(|(l, &p)| (QubitId(l as u32), p))
    }

    /// Physical qubit of each logical qubit, in logical order.
    pub fn physical_qubits(&self) -> &[u32] {
        &self.logical_to_physical
    }

    /// Restore the inverse map after deserialization.
    pub fn rebuild_inverse(&mut self) {
        self.physical_to_logical = self
            .logical_to_physical
            .iter()
            .enumerate()
            .map(|(l, &p)| (p, QubitId(l as u32)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_layout() {
        let layout = Layout::trivial(3);
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.get_physical(QubitId(2)), Some(2));
        assert_eq!(layout.get_logical(1), Some(QubitId(1)));
    }

    #[test]
    fn test_from_physical_rejects_collision() {
        assert!(Layout::from_physical(vec![4, 7, 4]).is_none());
        let layout = Layout::from_physical(vec![4, 7, 5]).unwrap();
        assert_eq!(layout.get_logical(7), Some(QubitId(1)));
        assert_eq!(layout.get_logical(0), None);
    }

    #[test]
    fn test_swap() {
        let mut layout = Layout::from_physical(vec![10, 11]).unwrap();
        layout.swap(10, 11);
        assert_eq!(layout.get_physical(QubitId(0)), Some(11));
        assert_eq!(layout.get_logical(10), Some(QubitId(1)));

        // Swapping into an empty physical qubit moves the logical qubit.
        layout.swap(11, 12);
        assert_eq!(layout.get_physical(QubitId(0)), Some(12));
        assert_eq!(layout.get_logical(11), None);
    }

    #[test]
    fn test_serde_roundtrip_rebuilds_inverse() {
        let layout = Layout::from_physical(vec![2, 0, 1]).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        let mut back: Layout = serde_json::from_str(&json).unwrap();
        back.rebuild_inverse();
        assert_eq!(back, layout);
    }
}
