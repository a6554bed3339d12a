//! HTTP handlers for browsers and operators.

pub mod client;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use switchboard_core::config::IceServer;
use switchboard_services::{PeerError, RelayError, SignalingRelay};

#[derive(Clone)]
pub struct ApiState {
    pub relay: SignalingRelay,
    /// Served verbatim from `GET /client/ice-servers`.
    pub ice_servers: Arc<Vec<IceServer>>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(relay: SignalingRelay, ice_servers: Vec<IceServer>) -> Self {
        Self {
            relay,
            ice_servers: Arc::new(ice_servers),
            started_at: Instant::now(),
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn peer_status(e: &PeerError) -> StatusCode {
    match e {
        PeerError::AlreadyExists(_) | PeerError::InvalidTransition { .. } => StatusCode::CONFLICT,
        PeerError::NotFound(_) => StatusCode::NOT_FOUND,
        PeerError::TransportDown(_) => StatusCode::SERVICE_UNAVAILABLE,
        PeerError::ClientGone(_) => StatusCode::GONE,
    }
}

fn relay_status(e: &RelayError) -> StatusCode {
    match e {
        RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        RelayError::TransportDown | RelayError::AlreadyAttached => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::Rejected(_) => StatusCode::BAD_GATEWAY,
        RelayError::DuplicateKey(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RelayError::Peer(p) => peer_status(p),
    }
}

/// Map a relay failure onto the response handlers return.
pub(crate) fn relay_error(e: RelayError) -> (StatusCode, String) {
    (relay_status(&e), e.to_string())
}

pub(crate) fn peer_error(e: PeerError) -> (StatusCode, String) {
    (peer_status(&e), e.to_string())
}
