//! Request handlers
//!
//! Method dispatch plus one handler per wire method. Handlers validate
//! params, run the engines, and map engine errors into API errors; the
//! caller turns those into protocol error objects.

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use atomgraph_engine::RetrievalRequest;

use crate::backend::Backend;
use crate::error::{ApiError, ApiResult};
use crate::requests::*;

const SERVER_NAME: &str = "atomgraph";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> ApiResult<T> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|e| ApiError::invalid_argument(format!("invalid params: {e}")))
}

impl Backend {
    /// Route a request to its handler
    pub async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> ApiResult<Value> {
        match method {
            "initialize" => {
                let response = self.handle_initialize().await;
                serde_json::to_value(response).map_err(|e| ApiError::internal(e.to_string()))
            }

            "graph/loadSnapshot" => {
                let params: LoadSnapshotParams = parse_params(params)?;
                let response = self.handle_load_snapshot(params).await?;
                serde_json::to_value(response).map_err(|e| ApiError::internal(e.to_string()))
            }

            "graph/getAtom" => {
                let params: GetAtomParams = parse_params(params)?;
                let response = self.handle_get_atom(params).await?;
                serde_json::to_value(response).map_err(|e| ApiError::internal(e.to_string()))
            }

            "graph/stats" => {
                let response = self.handle_stats().await;
                serde_json::to_value(response).map_err(|e| ApiError::internal(e.to_string()))
            }

            "graph/analyzeImpact" => {
                let params: ImpactParams = parse_params(params)?;
                let response = self.handle_analyze_impact(params, cancel).await?;
                serde_json::to_value(response).map_err(|e| ApiError::internal(e.to_string()))
            }

            "graph/retrieve" => {
                let params: RetrieveParams = parse_params(params)?;
                let response = self.handle_retrieve(params, cancel).await?;
                serde_json::to_value(response).map_err(|e| ApiError::internal(e.to_string()))
            }

            other => Err(ApiError::MethodNotFound(other.to_string())),
        }
    }

    pub async fn handle_initialize(&self) -> InitializeResponse {
        let engines = self.engines().await;
        InitializeResponse {
            server_name: SERVER_NAME.to_string(),
            server_version: SERVER_VERSION.to_string(),
            atom_count: engines.snapshot.atom_count(),
            edge_count: engines.snapshot.edge_count(),
        }
    }

    pub async fn handle_load_snapshot(
        &self,
        params: LoadSnapshotParams,
    ) -> ApiResult<LoadSnapshotResponse> {
        let engines = self.load_snapshot_file(&params.path).await?;
        Ok(LoadSnapshotResponse {
            atom_count: engines.snapshot.atom_count(),
            edge_count: engines.snapshot.edge_count(),
            orphan_warnings: engines.snapshot.orphan_warnings().to_vec(),
        })
    }

    pub async fn handle_get_atom(&self, params: GetAtomParams) -> ApiResult<GetAtomResponse> {
        let engines = self.engines().await;
        let id = params.atom_id.as_str().into();

        let atom = engines
            .snapshot
            .get(&id)
            .ok_or_else(|| ApiError::NotFound(params.atom_id.clone()))?
            .clone();

        Ok(GetAtomResponse {
            upstream_degree: engines
                .snapshot
                .neighbors(&id, atomgraph_engine::Direction::Upstream)
                .len(),
            downstream_degree: engines
                .snapshot
                .neighbors(&id, atomgraph_engine::Direction::Downstream)
                .len(),
            atom,
        })
    }

    pub async fn handle_stats(&self) -> atomgraph_engine::SnapshotStats {
        self.engines().await.snapshot.stats()
    }

    pub async fn handle_analyze_impact(
        &self,
        params: ImpactParams,
        cancel: &CancellationToken,
    ) -> ApiResult<ImpactResponse> {
        let start = Instant::now();
        let direction = params.direction()?;
        let depth = params.depth()?;
        let atom_id = params.atom_id();

        let engines = self.engines().await;
        let traversed = engines
            .traversal
            .traverse_with_cancel(&atom_id, direction, depth, cancel)?;
        let assessment = engines.scorer.score(&traversed, &engines.snapshot);

        let contributions: std::collections::HashMap<_, _> = assessment
            .contributions
            .iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let impacted_atoms = traversed
            .iter()
            .filter_map(|reached| {
                contributions.get(&reached.id).map(|c| ImpactedAtom {
                    id: reached.id.clone(),
                    depth: reached.depth,
                    path: reached.path.iter().map(|e| e.to_string()).collect(),
                    criticality: c.criticality,
                    contribution: c.contribution,
                })
            })
            .collect();

        Ok(ImpactResponse {
            impacted_atoms,
            severity: assessment.severity,
            note: assessment.note,
            query_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub async fn handle_retrieve(
        &self,
        params: RetrieveParams,
        cancel: &CancellationToken,
    ) -> ApiResult<RetrieveResponse> {
        let start = Instant::now();
        let cache_key = params.cache_key();

        if let Some(mut hit) = self.cache.get_retrieval(&cache_key) {
            hit.cached = true;
            hit.query_time_ms = start.elapsed().as_millis() as u64;
            return Ok(hit);
        }

        let mode = params.mode()?;
        let mut request = RetrievalRequest::new(params.query.clone(), params.top_k(), mode)
            .with_target_atoms(params.target_atoms());
        if let Some(filter) = params.type_filter()? {
            request = request.with_type_filter(filter);
        }

        let engines = self.engines().await;
        let result = engines.fusion.retrieve(&request, cancel).await?;

        let response = RetrieveResponse {
            results: result.results,
            degraded: result.degraded,
            warnings: result.warnings,
            severity: result.severity,
            cached: false,
            query_time_ms: start.elapsed().as_millis() as u64,
        };

        // transient vector outages should not pin degraded results in cache
        if !response.degraded {
            self.cache.set_retrieval(cache_key, response.clone());
        }

        Ok(response)
    }
}
