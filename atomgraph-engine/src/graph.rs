//! Immutable graph snapshot store
//!
//! Holds all atoms and their typed directed edges with forward and reverse
//! adjacency. A snapshot is built once by the ingestion collaborator and
//! shared as `Arc<GraphSnapshot>`; nothing mutates it afterwards, so
//! concurrent traversals need no locking. Replacing the graph means
//! building and installing a new snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::atom::{Atom, AtomId, Edge, EdgeType};

/// Direction of edge traversal relative to an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges pointing into the atom
    Upstream,
    /// Edges pointing out of the atom
    Downstream,
    /// Both directions
    Both,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upstream" => Ok(Self::Upstream),
            "downstream" => Ok(Self::Downstream),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// An edge endpoint as seen from one atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub edge_type: EdgeType,
    pub atom_id: AtomId,
}

/// A data-quality warning produced while building a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanWarning {
    /// The edge's source identifier
    pub source: AtomId,
    /// The edge's target identifier
    pub target: AtomId,
    /// Relationship type of the dropped edge
    pub edge_type: EdgeType,
    /// Which endpoint was missing
    pub missing: AtomId,
}

/// Immutable snapshot of the atom graph
///
/// Neighbor lists are sorted by (target identifier, edge type) at build
/// time, so repeated calls observe the same order and traversal output is
/// reproducible for identical input graphs.
pub struct GraphSnapshot {
    atoms: HashMap<AtomId, Atom>,
    outgoing: HashMap<AtomId, Vec<Neighbor>>,
    incoming: HashMap<AtomId, Vec<Neighbor>>,
    edge_count: usize,
    orphan_warnings: Vec<OrphanWarning>,
}

impl GraphSnapshot {
    /// Build a snapshot from already-typed atom and edge records
    pub fn build(atoms: Vec<Atom>, edges: Vec<Edge>) -> Self {
        SnapshotBuilder::new().atoms(atoms).edges(edges).build()
    }

    /// An empty snapshot
    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new())
    }

    /// Look up an atom by identifier
    pub fn get(&self, id: &AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Whether the snapshot contains the given atom
    pub fn contains(&self, id: &AtomId) -> bool {
        self.atoms.contains_key(id)
    }

    /// Neighbors of an atom in the requested direction
    ///
    /// For `Direction::Both` the downstream neighbors come first, then the
    /// upstream ones, each list in its deterministic order. Unknown atoms
    /// yield an empty list; the caller decides whether that is an error.
    pub fn neighbors(&self, id: &AtomId, direction: Direction) -> Vec<&Neighbor> {
        match direction {
            Direction::Downstream => self
                .outgoing
                .get(id)
                .map(|v| v.iter().collect())
                .unwrap_or_default(),
            Direction::Upstream => self
                .incoming
                .get(id)
                .map(|v| v.iter().collect())
                .unwrap_or_default(),
            Direction::Both => {
                let mut all: Vec<&Neighbor> = self
                    .outgoing
                    .get(id)
                    .map(|v| v.iter().collect())
                    .unwrap_or_default();
                if let Some(up) = self.incoming.get(id) {
                    all.extend(up.iter());
                }
                all
            }
        }
    }

    /// All atom identifiers, in ascending order
    pub fn all_ids(&self) -> Vec<&AtomId> {
        let mut ids: Vec<&AtomId> = self.atoms.keys().collect();
        ids.sort();
        ids
    }

    /// Iterate over all atoms
    pub fn iter_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values()
    }

    /// Number of atoms
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of distinct edges (after same-type parallel dedup)
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Warnings recorded for edges whose endpoints were missing
    pub fn orphan_warnings(&self) -> &[OrphanWarning] {
        &self.orphan_warnings
    }

    /// Snapshot statistics for the stats surface
    pub fn stats(&self) -> SnapshotStats {
        let mut by_atom_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_edge_type: BTreeMap<String, usize> = BTreeMap::new();

        for atom in self.atoms.values() {
            *by_atom_type.entry(atom.atom_type.to_string()).or_insert(0) += 1;
        }
        for neighbors in self.outgoing.values() {
            for n in neighbors {
                *by_edge_type.entry(n.edge_type.to_string()).or_insert(0) += 1;
            }
        }

        SnapshotStats {
            atom_count: self.atoms.len(),
            edge_count: self.edge_count,
            by_atom_type,
            by_edge_type,
            orphan_count: self.orphan_warnings.len(),
        }
    }
}

/// Aggregate counts over a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub atom_count: usize,
    pub edge_count: usize,
    pub by_atom_type: BTreeMap<String, usize>,
    pub by_edge_type: BTreeMap<String, usize>,
    pub orphan_count: usize,
}

/// Builder that normalizes raw atom/edge records into a snapshot
///
/// Duplicate same-type edges between the same ordered pair are collapsed
/// here, and edges with a missing endpoint are dropped with a warning
/// rather than failing the build.
#[derive(Default)]
pub struct SnapshotBuilder {
    atoms: Vec<Atom>,
    edges: Vec<Edge>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atoms(mut self, atoms: Vec<Atom>) -> Self {
        self.atoms.extend(atoms);
        self
    }

    pub fn atom(mut self, atom: Atom) -> Self {
        self.atoms.push(atom);
        self
    }

    pub fn edges(mut self, edges: Vec<Edge>) -> Self {
        self.edges.extend(edges);
        self
    }

    pub fn edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn build(self) -> GraphSnapshot {
        let mut atoms: HashMap<AtomId, Atom> = HashMap::with_capacity(self.atoms.len());
        for atom in self.atoms {
            if let Some(previous) = atoms.insert(atom.id.clone(), atom) {
                tracing::warn!(id = %previous.id, "duplicate atom id, keeping the later record");
            }
        }

        let mut outgoing: HashMap<AtomId, Vec<Neighbor>> = HashMap::new();
        let mut incoming: HashMap<AtomId, Vec<Neighbor>> = HashMap::new();
        let mut seen: HashSet<(AtomId, AtomId, EdgeType)> = HashSet::new();
        let mut orphan_warnings = Vec::new();
        let mut edge_count = 0;

        for edge in self.edges {
            let missing = if !atoms.contains_key(&edge.source) {
                Some(edge.source.clone())
            } else if !atoms.contains_key(&edge.target) {
                Some(edge.target.clone())
            } else {
                None
            };

            if let Some(missing) = missing {
                tracing::warn!(
                    source = %edge.source,
                    target = %edge.target,
                    edge_type = %edge.edge_type,
                    missing = %missing,
                    "dropping edge with missing endpoint"
                );
                orphan_warnings.push(OrphanWarning {
                    source: edge.source,
                    target: edge.target,
                    edge_type: edge.edge_type,
                    missing,
                });
                continue;
            }

            let key = (edge.source.clone(), edge.target.clone(), edge.edge_type);
            if !seen.insert(key) {
                // parallel same-type edge, redundant by contract
                continue;
            }

            outgoing.entry(edge.source.clone()).or_default().push(Neighbor {
                edge_type: edge.edge_type,
                atom_id: edge.target.clone(),
            });
            incoming.entry(edge.target).or_default().push(Neighbor {
                edge_type: edge.edge_type,
                atom_id: edge.source,
            });
            edge_count += 1;
        }

        // Deterministic neighbor order: by target id, then edge type
        for list in outgoing.values_mut().chain(incoming.values_mut()) {
            list.sort_by(|a, b| {
                a.atom_id
                    .cmp(&b.atom_id)
                    .then_with(|| a.edge_type.cmp(&b.edge_type))
            });
        }

        GraphSnapshot {
            atoms,
            outgoing,
            incoming,
            edge_count,
            orphan_warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomType;

    fn atom(id: &str) -> Atom {
        Atom::builder()
            .id(id)
            .atom_type(AtomType::Design)
            .title(format!("{id} title"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_neighbors_deterministic_order() {
        let snapshot = GraphSnapshot::build(
            vec![atom("A"), atom("B"), atom("C"), atom("D")],
            vec![
                Edge::new("A", "D", EdgeType::References),
                Edge::new("A", "B", EdgeType::Implements),
                Edge::new("A", "C", EdgeType::Requires),
            ],
        );

        let targets: Vec<&str> = snapshot
            .neighbors(&AtomId::new("A"), Direction::Downstream)
            .iter()
            .map(|n| n.atom_id.as_str())
            .collect();
        assert_eq!(targets, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_parallel_same_type_edges_deduplicated() {
        let snapshot = GraphSnapshot::build(
            vec![atom("A"), atom("B")],
            vec![
                Edge::new("A", "B", EdgeType::Requires),
                Edge::new("A", "B", EdgeType::Requires),
                Edge::new("A", "B", EdgeType::Implements),
            ],
        );

        assert_eq!(snapshot.edge_count(), 2);
        let neighbors = snapshot.neighbors(&AtomId::new("A"), Direction::Downstream);
        assert_eq!(neighbors.len(), 2);
    }

    #[test]
    fn test_orphan_edges_dropped_with_warning() {
        let snapshot = GraphSnapshot::build(
            vec![atom("A")],
            vec![Edge::new("A", "GONE", EdgeType::Triggers)],
        );

        assert_eq!(snapshot.edge_count(), 0);
        assert_eq!(snapshot.orphan_warnings().len(), 1);
        assert_eq!(snapshot.orphan_warnings()[0].missing.as_str(), "GONE");
        assert!(snapshot
            .neighbors(&AtomId::new("A"), Direction::Downstream)
            .is_empty());
    }

    #[test]
    fn test_upstream_neighbors() {
        let snapshot = GraphSnapshot::build(
            vec![atom("A"), atom("B")],
            vec![Edge::new("A", "B", EdgeType::Validates)],
        );

        let upstream = snapshot.neighbors(&AtomId::new("B"), Direction::Upstream);
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].atom_id.as_str(), "A");

        let both = snapshot.neighbors(&AtomId::new("B"), Direction::Both);
        assert_eq!(both.len(), 1);
    }

    #[test]
    fn test_unknown_atom_has_no_neighbors() {
        let snapshot = GraphSnapshot::build(vec![atom("A")], vec![]);
        assert!(snapshot
            .neighbors(&AtomId::new("Z"), Direction::Both)
            .is_empty());
        assert!(!snapshot.contains(&AtomId::new("Z")));
    }

    #[test]
    fn test_all_ids_sorted() {
        let snapshot = GraphSnapshot::build(vec![atom("C"), atom("A"), atom("B")], vec![]);
        let ids: Vec<&str> = snapshot.all_ids().iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_stats() {
        let snapshot = GraphSnapshot::build(
            vec![atom("A"), atom("B")],
            vec![
                Edge::new("A", "B", EdgeType::Requires),
                Edge::new("B", "A", EdgeType::References),
                Edge::new("A", "MISSING", EdgeType::Triggers),
            ],
        );

        let stats = snapshot.stats();
        assert_eq!(stats.atom_count, 2);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.orphan_count, 1);
        assert_eq!(stats.by_atom_type.get("design"), Some(&2));
        assert_eq!(stats.by_edge_type.get("requires"), Some(&1));
    }
}
