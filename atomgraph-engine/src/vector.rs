//! Vector backend capability traits and adapters
//!
//! The fusion engine depends only on the narrow `Embedder` and
//! `VectorIndex` traits; concrete backends plug in behind them. Two
//! adapters ship here: an in-process HNSW index over the snapshot's atom
//! embeddings, and an HTTP embedder for an external embedding provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::atom::AtomId;
use crate::error::{EngineError, Result};
use crate::graph::GraphSnapshot;

/// One nearest-neighbor result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: AtomId,
    /// Cosine distance, lower is closer
    pub distance: f32,
}

/// Embeds query text into a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Nearest-neighbor search over atom embeddings
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The k nearest atoms, ordered by ascending distance
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
}

/// Below this many points a linear scan beats building an HNSW graph
const HNSW_BUILD_THRESHOLD: usize = 16;

/// HNSW point wrapper for atom embeddings
#[derive(Clone)]
struct AtomPoint {
    id: AtomId,
    vector: Vec<f32>,
}

impl Point for AtomPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1 - similarity (HNSW finds minimum)
        1.0 - cosine_similarity(&self.vector, &other.vector)
    }
}

/// In-process vector index over the snapshot's precomputed embeddings
pub struct HnswVectorIndex {
    points: Vec<AtomPoint>,
    hnsw: RwLock<Option<HnswMap<AtomPoint, usize>>>,
}

impl HnswVectorIndex {
    /// Index every atom in the snapshot that carries an embedding
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let mut points: Vec<AtomPoint> = snapshot
            .iter_atoms()
            .filter_map(|atom| {
                atom.embedding.as_ref().map(|vector| AtomPoint {
                    id: atom.id.clone(),
                    vector: vector.clone(),
                })
            })
            .collect();
        points.sort_by(|a, b| a.id.cmp(&b.id));

        let index = Self {
            points,
            hnsw: RwLock::new(None),
        };
        index.build();
        index
    }

    fn build(&self) {
        if self.points.len() < HNSW_BUILD_THRESHOLD {
            return;
        }
        let values: Vec<usize> = (0..self.points.len()).collect();
        let hnsw = Builder::default()
            .ef_construction(100)
            .build(self.points.clone(), values);
        *self.hnsw.write() = Some(hnsw);
    }

    /// Number of indexed atoms
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Linear-scan fallback for small point sets
    fn linear_search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut results: Vec<SearchHit> = self
            .points
            .iter()
            .map(|p| SearchHit {
                id: p.id.clone(),
                distance: 1.0 - cosine_similarity(query, &p.vector),
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        results
    }
}

#[async_trait]
impl VectorIndex for HnswVectorIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.points.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self.hnsw.read();
        let Some(hnsw) = guard.as_ref() else {
            return Ok(self.linear_search(query, k));
        };

        let query_point = AtomPoint {
            id: AtomId::new("query"),
            vector: query.to_vec(),
        };

        let mut search = Search::default();
        let mut results = Vec::with_capacity(k);
        for item in hnsw.search(&query_point, &mut search) {
            let point = &self.points[*item.value];
            results.push(SearchHit {
                id: point.id.clone(),
                distance: 1.0 - cosine_similarity(query, &point.vector),
            });
            if results.len() >= k {
                break;
            }
        }
        Ok(results)
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP adapter for an external embedding provider
///
/// POSTs `{"input": <text>}` to the configured endpoint and expects
/// `{"embedding": [..]}` back. Calls run on the blocking pool with the
/// caller-supplied timeout; repeated texts hit the cache.
pub struct HttpEmbedder {
    endpoint: String,
    agent: ureq::Agent,
    cache: Arc<DashMap<String, Vec<f32>>>,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.into(),
            agent,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Number of cached embeddings
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached.clone());
        }

        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let body = serde_json::json!({ "input": text });

        let response = tokio::task::spawn_blocking(move || {
            agent
                .post(&endpoint)
                .send_json(body)
                .map_err(|e| EngineError::upstream(e.to_string()))?
                .into_json::<EmbedResponse>()
                .map_err(|e| EngineError::embedding(e.to_string()))
        })
        .await
        .map_err(|e| EngineError::upstream(format!("embedder task failed: {e}")))??;

        if response.embedding.is_empty() {
            return Err(EngineError::embedding("provider returned an empty vector"));
        }

        self.cache
            .insert(text.to_string(), response.embedding.clone());
        Ok(response.embedding)
    }
}
