//! Request and response types
//!
//! Typed params/response structs for every server method, with the parsing
//! helpers that turn wire strings into engine enums. All wire names are
//! camelCase.

use atomgraph_engine::{
    Atom, AtomId, AtomType, Criticality, Direction, OrphanWarning, RankedAtom, RetrievalMode,
    Severity,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Default traversal depth for impact analysis
pub const DEFAULT_IMPACT_DEPTH: u32 = 3;

/// Default result count for retrieval
pub const DEFAULT_TOP_K: usize = 10;

// ==========================================
// Initialize
// ==========================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub server_name: String,
    pub server_version: String,
    pub atom_count: usize,
    pub edge_count: usize,
}

// ==========================================
// Load Snapshot
// ==========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSnapshotParams {
    /// Path to a JSON document of already-typed atom and edge records
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSnapshotResponse {
    pub atom_count: usize,
    pub edge_count: usize,
    pub orphan_warnings: Vec<OrphanWarning>,
}

/// On-disk snapshot document shape
#[derive(Debug, Deserialize)]
pub struct SnapshotDocument {
    pub atoms: Vec<Atom>,
    #[serde(default)]
    pub edges: Vec<atomgraph_engine::Edge>,
}

// ==========================================
// Get Atom / Stats
// ==========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAtomParams {
    pub atom_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAtomResponse {
    pub atom: Atom,
    pub upstream_degree: usize,
    pub downstream_degree: usize,
}

// ==========================================
// Impact Analysis
// ==========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactParams {
    pub atom_id: String,
    /// "upstream", "downstream", or "both"
    #[serde(default)]
    pub direction: Option<String>,
    /// Maximum traversal depth; negative values are rejected
    #[serde(default)]
    pub max_depth: Option<i64>,
}

impl ImpactParams {
    pub fn direction(&self) -> ApiResult<Direction> {
        match self.direction.as_deref() {
            None => Ok(Direction::Downstream),
            Some(s) => s
                .parse()
                .map_err(|e: String| ApiError::invalid_argument(e)),
        }
    }

    pub fn depth(&self) -> ApiResult<u32> {
        match self.max_depth {
            None => Ok(DEFAULT_IMPACT_DEPTH),
            Some(d) if d < 0 => Err(ApiError::invalid_argument(format!(
                "maxDepth must be non-negative, got {d}"
            ))),
            Some(d) => Ok(d.min(u32::MAX as i64) as u32),
        }
    }

    pub fn atom_id(&self) -> AtomId {
        AtomId::new(self.atom_id.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactedAtom {
    pub id: AtomId,
    pub depth: u32,
    /// Edge types along the retained shortest route
    pub path: Vec<String>,
    pub criticality: Criticality,
    /// Criticality after depth decay
    pub contribution: Severity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactResponse {
    pub impacted_atoms: Vec<ImpactedAtom>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub query_time_ms: u64,
}

// ==========================================
// Retrieval
// ==========================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveParams {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// "entity", "path", or "impact"
    pub mode: String,
    /// Only return atoms of this type
    #[serde(default)]
    pub type_filter: Option<String>,
    /// Explicit seed atoms for impact mode
    #[serde(default)]
    pub target_atoms: Option<Vec<String>>,
}

impl RetrieveParams {
    pub fn mode(&self) -> ApiResult<RetrievalMode> {
        self.mode
            .parse()
            .map_err(|e: String| ApiError::invalid_argument(e))
    }

    pub fn type_filter(&self) -> ApiResult<Option<AtomType>> {
        match self.type_filter.as_deref() {
            None => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|e: String| ApiError::invalid_argument(e)),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }

    pub fn target_atoms(&self) -> Vec<AtomId> {
        self.target_atoms
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|s| AtomId::new(s.clone()))
            .collect()
    }

    /// Stable key for the response cache
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.mode,
            self.query,
            self.top_k(),
            self.type_filter.as_deref().unwrap_or(""),
            self.target_atoms.as_deref().unwrap_or_default().join(",")
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveResponse {
    pub results: Vec<RankedAtom>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Whether this response was served from the cache
    pub cached: bool,
    pub query_time_ms: u64,
}

// ==========================================
// Cancellation
// ==========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParams {
    /// Id of the in-flight request to cancel
    pub id: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_params_defaults() {
        let params: ImpactParams =
            serde_json::from_str(r#"{"atomId":"REQ-001"}"#).unwrap();
        assert_eq!(params.atom_id().as_str(), "REQ-001");
        assert_eq!(params.direction().unwrap(), Direction::Downstream);
        assert_eq!(params.depth().unwrap(), DEFAULT_IMPACT_DEPTH);
    }

    #[test]
    fn test_impact_params_negative_depth_rejected() {
        let params: ImpactParams =
            serde_json::from_str(r#"{"atomId":"REQ-001","maxDepth":-1}"#).unwrap();
        assert!(matches!(
            params.depth(),
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_impact_params_unknown_direction_rejected() {
        let params: ImpactParams =
            serde_json::from_str(r#"{"atomId":"REQ-001","direction":"sideways"}"#).unwrap();
        assert!(matches!(
            params.direction(),
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_retrieve_params_parsing() {
        let params: RetrieveParams = serde_json::from_str(
            r#"{"query":"auth","mode":"path","typeFilter":"design","topK":5}"#,
        )
        .unwrap();
        assert_eq!(params.mode().unwrap(), RetrievalMode::Path);
        assert_eq!(params.type_filter().unwrap(), Some(AtomType::Design));
        assert_eq!(params.top_k(), 5);
    }

    #[test]
    fn test_retrieve_params_unknown_mode_rejected() {
        let params: RetrieveParams =
            serde_json::from_str(r#"{"query":"auth","mode":"psychic"}"#).unwrap();
        assert!(matches!(params.mode(), Err(ApiError::InvalidArgument(_))));
    }

    #[test]
    fn test_cache_key_distinguishes_requests() {
        let a: RetrieveParams =
            serde_json::from_str(r#"{"query":"auth","mode":"entity"}"#).unwrap();
        let b: RetrieveParams =
            serde_json::from_str(r#"{"query":"auth","mode":"path"}"#).unwrap();
        let c: RetrieveParams =
            serde_json::from_str(r#"{"query":"auth","mode":"entity","topK":10}"#).unwrap();

        assert_ne!(a.cache_key(), b.cache_key());
        // explicit default topK matches the implied default
        assert_eq!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_snapshot_document_parse() {
        let doc: SnapshotDocument = serde_json::from_str(
            r#"{
                "atoms": [
                    {"id":"REQ-001","atom_type":"requirement","title":"t","criticality":"high"}
                ],
                "edges": [
                    {"source":"REQ-001","target":"REQ-001","edge_type":"references"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.atoms.len(), 1);
        assert_eq!(doc.edges.len(), 1);
    }
}
