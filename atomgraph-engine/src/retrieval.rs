//! Retrieval fusion engine
//!
//! Orchestrates the three retrieval modes over the vector backend and the
//! traversal engine, merges candidates from both sources, and re-ranks
//! them with a weighted composite score. Every request is stateless and
//! idempotent against an unchanged snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::atom::{AtomId, AtomType};
use crate::error::{EngineError, Result};
use crate::graph::{Direction, GraphSnapshot};
use crate::impact::{ImpactScorer, Severity};
use crate::traversal::TraversalEngine;
use crate::vector::{Embedder, SearchHit, VectorIndex};

/// Default pattern for atom identifiers named in query text
const DEFAULT_SEED_PATTERN: &str = r"[A-Z][A-Z0-9]*-[0-9]+";

/// Retrieval mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Vector similarity only
    Entity,
    /// Vector seeds expanded through the graph
    Path,
    /// Explicit seeds expanded through the graph, with risk annotations
    Impact,
}

impl std::str::FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "entity" => Ok(Self::Entity),
            "path" => Ok(Self::Path),
            "impact" => Ok(Self::Impact),
            other => Err(format!("unknown retrieval mode: {other}")),
        }
    }
}

/// How a result atom was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceKind {
    Vector,
    Graph,
    Both,
}

/// Component scores behind a fused score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub kind: ProvenanceKind,
    /// Normalized vector similarity in [0, 1]
    pub vector_score: f32,
    /// Graph proximity, 1/(1+depth)
    pub graph_score: f32,
    /// Criticality boost
    pub metadata_score: f32,
    /// Hops from the nearest seed, when reached by expansion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Risk contribution, impact mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<Severity>,
}

/// One ranked retrieval result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedAtom {
    pub id: AtomId,
    pub score: f32,
    pub provenance: Provenance,
}

/// Ranked, deduplicated retrieval output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub results: Vec<RankedAtom>,
    /// True when the vector backend failed and retrieval fell back to
    /// graph-only candidates
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    /// Overall risk, impact mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// A retrieval request
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: usize,
    pub mode: RetrievalMode,
    pub type_filter: Option<AtomType>,
    /// Explicit seed atoms for impact mode; extracted from the query text
    /// when empty
    pub target_atoms: Vec<AtomId>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, top_k: usize, mode: RetrievalMode) -> Self {
        Self {
            query: query.into(),
            top_k,
            mode,
            type_filter: None,
            target_atoms: Vec::new(),
        }
    }

    pub fn with_type_filter(mut self, atom_type: AtomType) -> Self {
        self.type_filter = Some(atom_type);
        self
    }

    pub fn with_target_atoms(mut self, targets: Vec<AtomId>) -> Self {
        self.target_atoms = targets;
        self
    }
}

/// Fusion weights and expansion parameters
///
/// The 0.6/0.3/0.1 split is a tunable default, not a contract; changing
/// the weights reorders results but never changes which atoms are
/// candidates.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub vector_weight: f32,
    pub graph_weight: f32,
    pub metadata_weight: f32,
    /// Traversal depth for path expansion around seeds
    pub expansion_depth: u32,
    /// Seed oversampling factor relative to topK
    pub oversample: usize,
    /// Timeout applied to each vector-backend call
    pub vector_timeout: Duration,
    /// Metadata boost for HIGH/CRITICAL atoms vs the rest
    pub high_criticality_boost: f32,
    pub base_metadata_score: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            graph_weight: 0.3,
            metadata_weight: 0.1,
            expansion_depth: 2,
            oversample: 2,
            vector_timeout: Duration::from_secs(2),
            high_criticality_boost: 1.0,
            base_metadata_score: 0.5,
        }
    }
}

/// Internal candidate state before scoring
#[derive(Debug, Default, Clone)]
struct Candidate {
    /// Cosine distance from the vector index, when it returned this atom
    vector_distance: Option<f32>,
    /// Minimum hops from any seed; 0 for seeds themselves
    depth: Option<u32>,
    /// Seeded without a vector hit (maximally relevant by definition)
    pure_seed: bool,
    from_vector: bool,
    from_graph: bool,
    /// Risk contribution from the impact scorer
    impact: Option<Severity>,
}

/// The retrieval fusion engine
pub struct FusionEngine {
    snapshot: Arc<GraphSnapshot>,
    traversal: TraversalEngine,
    scorer: ImpactScorer,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: FusionConfig,
    seed_pattern: Regex,
}

impl FusionEngine {
    pub fn new(
        snapshot: Arc<GraphSnapshot>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: FusionConfig,
    ) -> Self {
        let seed_pattern = Regex::new(DEFAULT_SEED_PATTERN).expect("default pattern is valid");
        Self {
            traversal: TraversalEngine::new(Arc::clone(&snapshot)),
            scorer: ImpactScorer::default(),
            snapshot,
            embedder,
            index,
            config,
            seed_pattern,
        }
    }

    pub fn snapshot(&self) -> &Arc<GraphSnapshot> {
        &self.snapshot
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Resolve seed atoms named in free-form query text
    ///
    /// Matches identifier-shaped tokens against the snapshot, plus atoms
    /// whose title occurs verbatim (case-insensitive) in the query.
    /// Returns seeds in ascending identifier order.
    pub fn extract_seeds(&self, query: &str) -> Vec<AtomId> {
        let mut seeds: Vec<AtomId> = self
            .seed_pattern
            .find_iter(query)
            .map(|m| AtomId::new(m.as_str()))
            .filter(|id| self.snapshot.contains(id))
            .collect();

        let query_lower = query.to_lowercase();
        for atom in self.snapshot.iter_atoms() {
            if query_lower.contains(&atom.title.to_lowercase()) {
                seeds.push(atom.id.clone());
            }
        }

        seeds.sort();
        seeds.dedup();
        seeds
    }

    /// Run one retrieval request
    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if request.top_k == 0 {
            return Err(EngineError::invalid_argument("topK must be positive"));
        }

        match request.mode {
            RetrievalMode::Entity => self.retrieve_entity(request, cancel).await,
            RetrievalMode::Path => self.retrieve_expanded(request, cancel, false).await,
            RetrievalMode::Impact => self.retrieve_expanded(request, cancel, true).await,
        }
    }

    /// Entity mode: vector similarity only
    async fn retrieve_entity(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        let mut warnings = Vec::new();

        let hits = match self.vector_candidates(&request.query, request.top_k, cancel).await {
            Ok(hits) => hits,
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(e) if e.is_degradable() => {
                warnings.push(format!("vector backend unavailable: {e}; graph-only results"));
                return Ok(self.degraded_seed_result(request, warnings));
            }
            Err(e) => return Err(e),
        };

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(atom) = self.snapshot.get(&hit.id) else {
                // index may lag a snapshot install; stale ids are dropped
                tracing::warn!(id = %hit.id, "vector hit not in snapshot, dropping");
                continue;
            };
            if let Some(filter) = request.type_filter {
                if atom.atom_type != filter {
                    continue;
                }
            }
            let vector_score = normalize_distance(hit.distance);
            results.push(RankedAtom {
                id: hit.id.clone(),
                score: vector_score,
                provenance: Provenance {
                    kind: ProvenanceKind::Vector,
                    vector_score,
                    graph_score: 0.0,
                    metadata_score: 0.0,
                    depth: None,
                    impact: None,
                },
            });
        }

        sort_ranked(&mut results);
        results.truncate(request.top_k);

        Ok(RetrievalResult {
            results,
            degraded: false,
            warnings,
            severity: None,
        })
    }

    /// Path and impact modes: seeds expanded through the graph, fused scores
    async fn retrieve_expanded(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
        impact_mode: bool,
    ) -> Result<RetrievalResult> {
        let mut warnings = Vec::new();
        let mut degraded = false;

        // Oversampled vector candidates; impact mode uses them only for
        // scoring expanded atoms, never for seeding.
        let oversampled = request.top_k.saturating_mul(self.config.oversample.max(1));
        let vector_hits = match self
            .vector_candidates(&request.query, oversampled, cancel)
            .await
        {
            Ok(hits) => hits,
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(e) if e.is_degradable() => {
                warnings.push(format!("vector backend unavailable: {e}; graph-only results"));
                degraded = true;
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        // Seed selection
        let seeds: Vec<AtomId> = if impact_mode {
            let named = if request.target_atoms.is_empty() {
                self.extract_seeds(&request.query)
            } else {
                request.target_atoms.clone()
            };
            if named.is_empty() {
                return Err(EngineError::invalid_argument(
                    "impact retrieval requires target atoms, none named in query",
                ));
            }
            for id in &named {
                if !self.snapshot.contains(id) {
                    return Err(EngineError::not_found(id.as_str()));
                }
            }
            named
        } else if degraded {
            // graph-only fallback: seeds named in the query text
            self.extract_seeds(&request.query)
        } else {
            vector_hits
                .iter()
                .map(|h| h.id.clone())
                .filter(|id| self.snapshot.contains(id))
                .collect()
        };

        let distances: HashMap<AtomId, f32> = vector_hits
            .iter()
            .filter(|h| self.snapshot.contains(&h.id))
            .map(|h| (h.id.clone(), h.distance))
            .collect();

        let mut candidates: HashMap<AtomId, Candidate> = HashMap::new();

        // Path mode treats the vector hits themselves as candidates; impact
        // mode only uses them to score atoms the expansion reaches.
        if !impact_mode && !degraded {
            for id in distances.keys() {
                candidates.entry(id.clone()).or_default().from_vector = true;
            }
        }

        for seed in &seeds {
            let entry = candidates.entry(seed.clone()).or_default();
            entry.depth = Some(0);
            entry.from_graph = true;
            entry.pure_seed = true;
        }

        // Expand each seed through the graph
        let mut overall_severity: Option<Severity> = None;
        for seed in &seeds {
            let traversed = self.traversal.traverse_with_cancel(
                seed,
                Direction::Both,
                self.config.expansion_depth,
                cancel,
            )?;

            if impact_mode {
                let assessment = self.scorer.score(&traversed, &self.snapshot);
                overall_severity = Some(
                    overall_severity
                        .map_or(assessment.severity, |s| s.max(assessment.severity)),
                );
                for contribution in &assessment.contributions {
                    let entry = candidates.entry(contribution.id.clone()).or_default();
                    entry.impact = Some(
                        entry
                            .impact
                            .map_or(contribution.contribution, |s| s.max(contribution.contribution)),
                    );
                }
            }

            for reached in traversed.iter() {
                let entry = candidates.entry(reached.id.clone()).or_default();
                entry.from_graph = true;
                entry.depth = Some(entry.depth.map_or(reached.depth, |d| d.min(reached.depth)));
            }
        }

        // Attach vector distances to whichever candidates the index scored
        for (id, candidate) in candidates.iter_mut() {
            if let Some(distance) = distances.get(id) {
                candidate.vector_distance = Some(*distance);
                candidate.from_vector = true;
            }
        }

        let mut results = self.rank(candidates, request.type_filter);
        results.truncate(request.top_k);

        Ok(RetrievalResult {
            results,
            degraded,
            warnings,
            severity: if impact_mode { overall_severity } else { None },
        })
    }

    /// Score and order a candidate set
    fn rank(
        &self,
        candidates: HashMap<AtomId, Candidate>,
        type_filter: Option<AtomType>,
    ) -> Vec<RankedAtom> {
        let mut results = Vec::with_capacity(candidates.len());

        for (id, candidate) in candidates {
            let Some(atom) = self.snapshot.get(&id) else {
                continue;
            };
            if let Some(filter) = type_filter {
                if atom.atom_type != filter {
                    continue;
                }
            }

            // A seed the vector index never returned is maximally relevant
            // by definition of being the analysis subject; one the index did
            // return is scored like any other hit.
            let vector_score = match candidate.vector_distance {
                Some(distance) => normalize_distance(distance),
                None if candidate.pure_seed => 1.0,
                None => 0.0,
            };
            let graph_score = candidate
                .depth
                .map(|d| 1.0 / (1.0 + d as f32))
                .unwrap_or(0.0);
            let metadata_score = if atom.is_high_criticality() {
                self.config.high_criticality_boost
            } else {
                self.config.base_metadata_score
            };

            let score = self.config.vector_weight * vector_score
                + self.config.graph_weight * graph_score
                + self.config.metadata_weight * metadata_score;

            let kind = match (candidate.from_vector, candidate.from_graph) {
                (true, true) => ProvenanceKind::Both,
                (true, false) => ProvenanceKind::Vector,
                _ => ProvenanceKind::Graph,
            };

            results.push(RankedAtom {
                id,
                score,
                provenance: Provenance {
                    kind,
                    vector_score,
                    graph_score,
                    metadata_score,
                    depth: candidate.depth,
                    impact: candidate.impact,
                },
            });
        }

        sort_ranked(&mut results);
        results
    }

    /// Graph-only fallback for entity mode when the vector backend is down
    fn degraded_seed_result(
        &self,
        request: &RetrievalRequest,
        warnings: Vec<String>,
    ) -> RetrievalResult {
        let seeds = self.extract_seeds(&request.query);
        let mut candidates: HashMap<AtomId, Candidate> = HashMap::new();
        for seed in seeds {
            candidates.insert(
                seed,
                Candidate {
                    depth: Some(0),
                    pure_seed: true,
                    from_graph: true,
                    ..Candidate::default()
                },
            );
        }
        let mut results = self.rank(candidates, request.type_filter);
        results.truncate(request.top_k);
        RetrievalResult {
            results,
            degraded: true,
            warnings,
            severity: None,
        }
    }

    /// Embed the query and search the vector index, both under the
    /// configured timeout, aborting promptly on cancellation
    async fn vector_candidates(
        &self,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        let call = async {
            let vector = self.embedder.embed(query).await?;
            self.index.search(&vector, k).await
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            outcome = tokio::time::timeout(self.config.vector_timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(EngineError::upstream(format!(
                    "vector backend timed out after {:?}",
                    self.config.vector_timeout
                ))),
            },
        }
    }
}

/// Rescale a cosine distance into a [0, 1] similarity score
///
/// Per-atom and set-independent, so a given atom's vector score never
/// depends on which other atoms matched.
fn normalize_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Descending score, ties broken by ascending identifier
fn sort_ranked(results: &mut [RankedAtom]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
