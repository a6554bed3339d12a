//! /api/status, /api/peers, /health handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

// ── /api/status ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub resource_attached: bool,
    pub link: Option<String>,
    pub pending_requests: usize,
    pub peers: usize,
    pub reply_timeout_ms: u64,
    pub uptime_secs: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let snapshot = state.relay.snapshot().await;

    Json(StatusResponse {
        resource_attached: snapshot.link.is_some(),
        link: snapshot.link.map(|l| l.to_string()),
        pending_requests: snapshot.pending_requests,
        peers: snapshot.peers.len(),
        reply_timeout_ms: state.relay.reply_timeout().as_millis() as u64,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── /api/peers ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfo>,
}

#[derive(Serialize)]
pub struct PeerInfo {
    pub peer_id: String,
    pub state: &'static str,
    pub link: String,
    pub age_secs: u64,
    pub buffered_candidates: usize,
    pub socket_client: bool,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let mut peers: Vec<PeerInfo> = state
        .relay
        .peers()
        .sessions()
        .into_iter()
        .map(|s| PeerInfo {
            peer_id: s.peer_id.to_string(),
            state: s.state.as_str(),
            link: s.link.to_string(),
            age_secs: s.age.as_secs(),
            buffered_candidates: s.buffered_candidates,
            socket_client: s.socket_client,
        })
        .collect();
    peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));

    Json(PeersResponse { peers })
}

// ── /health ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
