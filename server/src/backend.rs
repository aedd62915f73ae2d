//! Server backend
//!
//! Owns the installed graph snapshot and the engines built over it, plus
//! the response cache and the in-flight cancellation registry. Snapshot
//! installation swaps an `Arc` under a lock; requests already holding the
//! old `Arc` finish against a consistent view.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use atomgraph_engine::{
    Atom, Edge, Embedder, EngineError, FusionConfig, FusionEngine, GraphSnapshot,
    HnswVectorIndex, HttpEmbedder, ImpactScorer, TraversalEngine,
};

use crate::cache::ResponseCache;
use crate::error::ApiResult;
use crate::requests::SnapshotDocument;

/// Engines built over one snapshot generation
pub struct Engines {
    pub snapshot: Arc<GraphSnapshot>,
    pub traversal: TraversalEngine,
    pub scorer: ImpactScorer,
    pub fusion: FusionEngine,
}

impl Engines {
    fn build(
        snapshot: Arc<GraphSnapshot>,
        embedder: Arc<dyn Embedder>,
        config: FusionConfig,
    ) -> Self {
        let index = Arc::new(HnswVectorIndex::from_snapshot(&snapshot));
        Self {
            traversal: TraversalEngine::new(Arc::clone(&snapshot)),
            scorer: ImpactScorer::default(),
            fusion: FusionEngine::new(Arc::clone(&snapshot), embedder, index, config),
            snapshot,
        }
    }
}

/// Embedder used when no provider is configured
///
/// Every call reports the backend as unavailable, which the fusion engine
/// turns into graph-only degraded retrieval.
struct OfflineEmbedder;

#[async_trait::async_trait]
impl Embedder for OfflineEmbedder {
    async fn embed(&self, _text: &str) -> atomgraph_engine::Result<Vec<f32>> {
        Err(EngineError::upstream("no embedding provider configured"))
    }
}

/// Backend shared by all request handlers
pub struct Backend {
    engines: RwLock<Arc<Engines>>,
    embedder: Arc<dyn Embedder>,
    fusion_config: FusionConfig,
    pub(crate) cache: ResponseCache,
    inflight: DashMap<String, CancellationToken>,
}

impl Backend {
    /// Create a backend with an empty snapshot
    pub fn new(
        embedder_url: Option<String>,
        embed_timeout: Duration,
        fusion_config: FusionConfig,
        cache_capacity: usize,
    ) -> Self {
        let embedder: Arc<dyn Embedder> = match embedder_url {
            Some(url) => {
                tracing::info!(%url, "using HTTP embedding provider");
                Arc::new(HttpEmbedder::new(url, embed_timeout))
            }
            None => {
                tracing::info!("no embedding provider configured, retrieval degrades to graph-only");
                Arc::new(OfflineEmbedder)
            }
        };

        let snapshot = Arc::new(GraphSnapshot::empty());
        let engines = Engines::build(
            Arc::clone(&snapshot),
            Arc::clone(&embedder),
            fusion_config.clone(),
        );

        Self {
            engines: RwLock::new(Arc::new(engines)),
            embedder,
            fusion_config,
            cache: ResponseCache::new(cache_capacity),
            inflight: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_embedder(embedder: Arc<dyn Embedder>, fusion_config: FusionConfig) -> Self {
        let snapshot = Arc::new(GraphSnapshot::empty());
        let engines = Engines::build(
            Arc::clone(&snapshot),
            Arc::clone(&embedder),
            fusion_config.clone(),
        );
        Self {
            engines: RwLock::new(Arc::new(engines)),
            embedder,
            fusion_config,
            cache: ResponseCache::new(100),
            inflight: DashMap::new(),
        }
    }

    /// Current engine generation; the returned `Arc` stays valid across
    /// concurrent snapshot installs
    pub async fn engines(&self) -> Arc<Engines> {
        Arc::clone(&*self.engines.read().await)
    }

    /// Install a new snapshot built from already-typed records
    pub async fn install_snapshot(&self, atoms: Vec<Atom>, edges: Vec<Edge>) -> Arc<Engines> {
        let snapshot = Arc::new(GraphSnapshot::build(atoms, edges));
        tracing::info!(
            atoms = snapshot.atom_count(),
            edges = snapshot.edge_count(),
            orphans = snapshot.orphan_warnings().len(),
            "installing graph snapshot"
        );

        let engines = Arc::new(Engines::build(
            snapshot,
            Arc::clone(&self.embedder),
            self.fusion_config.clone(),
        ));

        *self.engines.write().await = Arc::clone(&engines);
        self.cache.clear();
        engines
    }

    /// Load and install a snapshot document from disk
    pub async fn load_snapshot_file(&self, path: &str) -> ApiResult<Arc<Engines>> {
        let bytes = tokio::fs::read(path).await?;
        let document: SnapshotDocument = serde_json::from_slice(&bytes)
            .map_err(|e| crate::error::ApiError::Snapshot(format!("{path}: {e}")))?;
        Ok(self.install_snapshot(document.atoms, document.edges).await)
    }

    /// Register an in-flight request; returns its cancellation token
    pub fn register_request(&self, key: String) -> CancellationToken {
        let token = CancellationToken::new();
        self.inflight.insert(key, token.clone());
        token
    }

    /// Drop a finished request from the registry
    pub fn finish_request(&self, key: &str) {
        self.inflight.remove(key);
    }

    /// Cancel an in-flight request, if it is still running
    pub fn cancel_request(&self, key: &str) -> bool {
        match self.inflight.get(key) {
            Some(entry) => {
                entry.cancel();
                tracing::debug!(request = key, "cancelled in-flight request");
                true
            }
            None => false,
        }
    }

    /// Number of requests currently in flight
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomgraph_engine::{AtomType, EdgeType};

    fn atom(id: &str) -> Atom {
        Atom::builder()
            .id(id)
            .atom_type(AtomType::Requirement)
            .title(format!("{id} title"))
            .build()
            .unwrap()
    }

    fn backend() -> Backend {
        Backend::new(
            None,
            Duration::from_secs(1),
            FusionConfig::default(),
            10,
        )
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let backend = backend();
        let engines = backend.engines().await;
        assert_eq!(engines.snapshot.atom_count(), 0);
    }

    #[tokio::test]
    async fn test_install_swaps_snapshot() {
        let backend = backend();
        let before = backend.engines().await;

        backend
            .install_snapshot(
                vec![atom("A"), atom("B")],
                vec![Edge::new("A", "B", EdgeType::Requires)],
            )
            .await;

        let after = backend.engines().await;
        assert_eq!(after.snapshot.atom_count(), 2);
        // old generation still readable by in-flight requests
        assert_eq!(before.snapshot.atom_count(), 0);
    }

    #[tokio::test]
    async fn test_install_clears_cache() {
        let backend = backend();
        backend.cache.set_retrieval(
            "k".to_string(),
            crate::requests::RetrieveResponse {
                results: vec![],
                degraded: false,
                warnings: vec![],
                severity: None,
                cached: false,
                query_time_ms: 0,
            },
        );

        backend.install_snapshot(vec![atom("A")], vec![]).await;
        assert!(backend.cache.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_registry() {
        let backend = backend();
        let token = backend.register_request("7".to_string());
        assert_eq!(backend.inflight_count(), 1);
        assert!(!token.is_cancelled());

        assert!(backend.cancel_request("7"));
        assert!(token.is_cancelled());

        backend.finish_request("7");
        assert_eq!(backend.inflight_count(), 0);
        assert!(!backend.cancel_request("7"));
    }

    #[tokio::test]
    async fn test_load_snapshot_file_missing_path() {
        let backend = backend();
        let result = backend.load_snapshot_file("/nonexistent/snapshot.json").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{
                "atoms": [
                    {"id":"REQ-001","atom_type":"requirement","title":"auth required"},
                    {"id":"DES-001","atom_type":"design","title":"auth design"}
                ],
                "edges": [
                    {"source":"REQ-001","target":"DES-001","edge_type":"implements"},
                    {"source":"DES-001","target":"GONE-1","edge_type":"references"}
                ]
            }"#,
        )
        .unwrap();

        let backend = backend();
        let engines = backend
            .load_snapshot_file(path.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(engines.snapshot.atom_count(), 2);
        assert_eq!(engines.snapshot.edge_count(), 1);
        assert_eq!(engines.snapshot.orphan_warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_load_snapshot_file_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{ not json").unwrap();

        let backend = backend();
        let result = backend.load_snapshot_file(path.to_str().unwrap()).await;
        assert!(matches!(
            result,
            Err(crate::error::ApiError::Snapshot(_))
        ));
    }
}
