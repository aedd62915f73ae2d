//! Bounded breadth-first graph traversal
//!
//! The single walking primitive behind both impact analysis and the
//! retrieval engine's path expansion. Walks are breadth-first with a
//! visited/min-depth map, so cyclic graphs terminate and work is bounded
//! by the reachable subgraph rather than the number of distinct paths.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::atom::{AtomId, EdgeType};
use crate::error::{EngineError, Result};
use crate::graph::{Direction, GraphSnapshot};

/// Hard ceiling on traversal depth, enforced regardless of caller input.
///
/// Keeps latency bounded on pathological graphs (near-complete graphs,
/// deep trigger chains); callers asking for more are clamped, not failed.
pub const MAX_TRAVERSAL_DEPTH: u32 = 5;

/// An atom reached by a traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachedAtom {
    /// Identifier of the reached atom
    pub id: AtomId,
    /// Minimum number of hops from the start atom
    pub depth: u32,
    /// Edge types along the retained shortest route
    pub path: Vec<EdgeType>,
}

/// Result of a bounded traversal, one entry per distinct atom reached
///
/// Entries are ordered by (depth, identifier), so identical inputs against
/// an unchanged snapshot produce byte-identical output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalResult {
    reached: Vec<ReachedAtom>,
}

impl TraversalResult {
    fn from_map(map: HashMap<AtomId, (u32, Vec<EdgeType>)>) -> Self {
        let mut reached: Vec<ReachedAtom> = map
            .into_iter()
            .map(|(id, (depth, path))| ReachedAtom { id, depth, path })
            .collect();
        reached.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
        Self { reached }
    }

    /// Reached atoms in deterministic order
    pub fn iter(&self) -> impl Iterator<Item = &ReachedAtom> {
        self.reached.iter()
    }

    /// Look up a reached atom by identifier
    pub fn get(&self, id: &AtomId) -> Option<&ReachedAtom> {
        self.reached.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &AtomId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.reached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reached.is_empty()
    }

    /// Consume into the ordered entry list
    pub fn into_vec(self) -> Vec<ReachedAtom> {
        self.reached
    }
}

/// Breadth-first traversal over an immutable graph snapshot
pub struct TraversalEngine {
    snapshot: Arc<GraphSnapshot>,
}

impl TraversalEngine {
    pub fn new(snapshot: Arc<GraphSnapshot>) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Arc<GraphSnapshot> {
        &self.snapshot
    }

    /// Walk from `start` in `direction`, up to `max_depth` hops
    ///
    /// The start atom itself is depth 0 and excluded from the result.
    /// `max_depth == 0` yields an empty result; depths above
    /// [`MAX_TRAVERSAL_DEPTH`] are clamped. Fails with `NotFound` when the
    /// start atom is absent from the snapshot.
    ///
    /// `Direction::Both` is the union of the upstream and downstream walks,
    /// keeping per atom the entry with the smaller depth; on equal depths
    /// the downstream path wins.
    pub fn traverse(
        &self,
        start: &AtomId,
        direction: Direction,
        max_depth: u32,
    ) -> Result<TraversalResult> {
        self.traverse_with_cancel(start, direction, max_depth, &CancellationToken::new())
    }

    /// Cancellable variant of [`traverse`](Self::traverse)
    ///
    /// Cancellation is observed between frontier expansions and returns
    /// `EngineError::Cancelled` with no partial result.
    pub fn traverse_with_cancel(
        &self,
        start: &AtomId,
        direction: Direction,
        max_depth: u32,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult> {
        if !self.snapshot.contains(start) {
            return Err(EngineError::not_found(start.as_str()));
        }

        let max_depth = if max_depth > MAX_TRAVERSAL_DEPTH {
            tracing::debug!(
                requested = max_depth,
                ceiling = MAX_TRAVERSAL_DEPTH,
                "clamping traversal depth"
            );
            MAX_TRAVERSAL_DEPTH
        } else {
            max_depth
        };

        if max_depth == 0 {
            return Ok(TraversalResult::default());
        }

        match direction {
            Direction::Upstream | Direction::Downstream => {
                let map = self.walk(start, direction, max_depth, cancel)?;
                Ok(TraversalResult::from_map(map))
            }
            Direction::Both => {
                let mut merged = self.walk(start, Direction::Downstream, max_depth, cancel)?;
                let upstream = self.walk(start, Direction::Upstream, max_depth, cancel)?;
                for (id, (depth, path)) in upstream {
                    match merged.get(&id) {
                        // equal depths keep the downstream entry
                        Some((existing, _)) if *existing <= depth => {}
                        _ => {
                            merged.insert(id, (depth, path));
                        }
                    }
                }
                Ok(TraversalResult::from_map(merged))
            }
        }
    }

    /// Single-direction BFS with a visited/min-depth map
    fn walk(
        &self,
        start: &AtomId,
        direction: Direction,
        max_depth: u32,
        cancel: &CancellationToken,
    ) -> Result<HashMap<AtomId, (u32, Vec<EdgeType>)>> {
        debug_assert!(!matches!(direction, Direction::Both));

        let mut visited: HashMap<AtomId, (u32, Vec<EdgeType>)> = HashMap::new();
        let mut queue: VecDeque<(AtomId, u32, Vec<EdgeType>)> = VecDeque::new();

        queue.push_back((start.clone(), 0, Vec::new()));
        // start is the subject, not an impact; mark visited so cycles back
        // into it are ignored
        visited.insert(start.clone(), (0, Vec::new()));

        while let Some((current, depth, path)) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if depth >= max_depth {
                continue;
            }

            for neighbor in self.snapshot.neighbors(&current, direction) {
                if visited.contains_key(&neighbor.atom_id) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(neighbor.edge_type);
                visited.insert(neighbor.atom_id.clone(), (depth + 1, next_path.clone()));
                queue.push_back((neighbor.atom_id.clone(), depth + 1, next_path));
            }
        }

        visited.remove(start);
        Ok(visited)
    }
}
