//! Atomgraph Engine
//!
//! Graph-aware retrieval and impact analysis over a documentation atom
//! graph: typed atoms connected by typed directed edges.
//!
//! ## Features
//!
//! - **Immutable graph snapshots** - lock-free concurrent reads; ingestion
//!   installs a new snapshot instead of mutating in place
//! - **Bounded BFS traversal** - cycle-safe upstream/downstream/both walks
//!   with exact shortest-hop depths and a hard depth ceiling
//! - **Risk scoring** - criticality with depth decay over traversal results
//! - **Retrieval fusion** - vector similarity + graph proximity + metadata
//!   boosts, merged, deduplicated, and explainably ranked
//! - **Pluggable vector backend** - narrow `Embedder`/`VectorIndex` traits
//!   with an in-process HNSW adapter and an HTTP embedder
//!
//! ## Example
//!
//! ```ignore
//! use atomgraph_engine::{Direction, GraphSnapshot, ImpactScorer, TraversalEngine};
//!
//! let snapshot = Arc::new(GraphSnapshot::build(atoms, edges));
//! let traversal = TraversalEngine::new(Arc::clone(&snapshot));
//!
//! let result = traversal.traverse(&"REQ-001".into(), Direction::Downstream, 3)?;
//! let assessment = ImpactScorer::default().score(&result, &snapshot);
//! ```

pub mod atom;
pub mod error;
pub mod graph;
pub mod impact;
pub mod retrieval;
pub mod traversal;
pub mod vector;

// Re-exports for convenience
pub use atom::{Atom, AtomBuilder, AtomId, AtomStatus, AtomType, Criticality, Edge, EdgeType};
pub use error::{EngineError, Result};
pub use graph::{Direction, GraphSnapshot, OrphanWarning, SnapshotBuilder, SnapshotStats};
pub use impact::{ImpactAssessment, ImpactContribution, ImpactPolicy, ImpactScorer, Severity};
pub use retrieval::{
    FusionConfig, FusionEngine, Provenance, ProvenanceKind, RankedAtom, RetrievalMode,
    RetrievalRequest, RetrievalResult,
};
pub use traversal::{ReachedAtom, TraversalEngine, TraversalResult, MAX_TRAVERSAL_DEPTH};
pub use vector::{Embedder, HnswVectorIndex, HttpEmbedder, SearchHit, VectorIndex};
