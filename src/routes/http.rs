// GET handlers: version, interfaces, persisted history, latest ping status

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::history_repo::{BandwidthRecord, InterfaceInfoRecord, PingRecord};
use crate::models::{IfIndex, PingSample};
use crate::sampler::SamplerPhase;
use crate::version::{NAME, VERSION};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub(super) struct LimitQuery {
    limit: Option<u32>,
}

impl LimitQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal(e: anyhow::Error) -> ApiError {
    tracing::warn!(error = %e, "history query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetStatus {
    name: String,
    phase: SamplerPhase,
    index: Option<IfIndex>,
}

#[derive(Debug, Serialize)]
pub(super) struct InterfacesResponse {
    targets: Vec<TargetStatus>,
    interfaces: Vec<InterfaceInfoRecord>,
}

/// GET /api/interfaces: configured targets with their sampler phase, plus
/// the stored metadata of every resolved interface.
pub(super) async fn interfaces_handler(
    State(state): State<AppState>,
) -> Result<Json<InterfacesResponse>, ApiError> {
    let targets = state
        .monitors
        .bandwidth
        .as_ref()
        .map(|sampler| {
            sampler
                .target_ids()
                .filter_map(|id| {
                    Some(TargetStatus {
                        name: id.to_string(),
                        phase: sampler.phase(id)?,
                        index: sampler.target(id)?.resolved_index,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let interfaces = state.history.latest_interface_info().await.map_err(internal)?;
    Ok(Json(InterfacesResponse {
        targets,
        interfaces,
    }))
}

/// GET /api/bandwidths: newest aggregate rows first.
pub(super) async fn bandwidths_handler(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<BandwidthRecord>>, ApiError> {
    let rows = state
        .history
        .recent_bandwidths(q.limit())
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

/// GET /api/pings: newest aggregate rows first.
pub(super) async fn pings_handler(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<PingRecord>>, ApiError> {
    let rows = state
        .history
        .recent_pings(q.limit())
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

/// GET /api/pings/latest: last probe per host (not yet aggregated).
pub(super) async fn latest_pings_handler(State(state): State<AppState>) -> impl IntoResponse {
    let samples: Vec<PingSample> = state
        .monitors
        .ping
        .as_ref()
        .map(|prober| {
            prober
                .hosts()
                .filter_map(|h| prober.last_sample(h))
                .collect()
        })
        .unwrap_or_default();
    Json(samples)
}
