//! /client handlers — what browsers call.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchboard_core::config::IceServer;
use switchboard_core::PeerId;
use switchboard_services::{ClientSink, OfferRequest};

use super::{peer_error, relay_error, ApiState};

// ── /client/offer ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferBody {
    pub offer: Value,
    /// Opens a peer session so candidates can be exchanged afterwards.
    #[serde(default)]
    pub peer_id: Option<PeerId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub answer: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
}

pub async fn handle_offer(
    State(state): State<ApiState>,
    Json(body): Json<OfferBody>,
) -> Result<Json<OfferResponse>, (StatusCode, String)> {
    let request = match body.peer_id.clone() {
        Some(peer_id) => OfferRequest::for_peer(body.offer, peer_id, ClientSink::Poll),
        None => OfferRequest::oneshot(body.offer),
    };

    let answer = state.relay.send(request).await.map_err(|e| {
        tracing::warn!(error = %e, peer = ?body.peer_id, "offer failed");
        relay_error(e)
    })?;

    Ok(Json(OfferResponse {
        answer,
        peer_id: body.peer_id,
    }))
}

// ── /client/candidate ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBody {
    pub peer_id: PeerId,
    pub candidate: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResponse {
    pub peer_id: PeerId,
    pub forwarded: bool,
}

pub async fn handle_candidate(
    State(state): State<ApiState>,
    Json(body): Json<CandidateBody>,
) -> Result<Json<CandidateResponse>, (StatusCode, String)> {
    state
        .relay
        .forward_candidate(&body.peer_id, body.candidate)
        .map_err(peer_error)?;

    Ok(Json(CandidateResponse {
        peer_id: body.peer_id,
        forwarded: true,
    }))
}

// ── /client/candidates/{peer_id} ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesResponse {
    pub peer_id: PeerId,
    pub state: &'static str,
    pub candidates: Vec<Value>,
}

pub async fn handle_take_candidates(
    State(state): State<ApiState>,
    Path(peer_id): Path<String>,
) -> Result<Json<CandidatesResponse>, (StatusCode, String)> {
    let peer_id = PeerId::from(peer_id);
    let peers = state.relay.peers();

    let candidates = peers.take_candidates(&peer_id).map_err(peer_error)?;
    let session = peers.lookup(&peer_id).map_err(peer_error)?;

    Ok(Json(CandidatesResponse {
        peer_id,
        state: session.state.as_str(),
        candidates,
    }))
}

// ── /client/peers/{peer_id} (DELETE) ──────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCloseResponse {
    pub peer_id: PeerId,
    pub closed: bool,
}

pub async fn handle_peer_close(
    State(state): State<ApiState>,
    Path(peer_id): Path<String>,
) -> Json<PeerCloseResponse> {
    let peer_id = PeerId::from(peer_id);
    let closed = state.relay.close_peer(&peer_id).is_some();

    if closed {
        tracing::info!(peer = %peer_id, "peer closed by client");
    }

    Json(PeerCloseResponse { peer_id, closed })
}

// ── /client/ice-servers ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServersResponse {
    pub ice_servers: Vec<IceServer>,
}

pub async fn handle_ice_servers(State(state): State<ApiState>) -> Json<IceServersResponse> {
    Json(IceServersResponse {
        ice_servers: state.ice_servers.as_ref().clone(),
    })
}
