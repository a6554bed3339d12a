//! Signaling envelopes for both sides of the relay.
//!
//! Every frame on the resource connection is one JSON object tagged by
//! `type`. Frames are decoded once, here, into [`SignalingMessage`]; nothing
//! past this module looks at raw JSON shapes. Session descriptions and ICE
//! candidates stay opaque (`serde_json::Value`) because the relay never
//! interprets them.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Links one forwarded offer to the answer that eventually comes back.
///
/// Drawn at random per request, never from a counter, so a restarted relay
/// cannot collide with answers still in flight from a previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(u64);

impl CorrelationKey {
    /// Largest integer a JavaScript `Number` holds exactly (2^53 - 1).
    pub const MAX: u64 = (1 << 53) - 1;

    /// Draw a fresh key in `1..=MAX`.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(1..=Self::MAX))
    }

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for one browser-side peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random (v4 UUID) peer id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Peer connection state ────────────────────────────────────────────────────

/// Connection state of a media peer, as reported by the resource server.
///
/// Mirrors the WebRTC `RTCPeerConnectionState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// States after which the peer connection is gone for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

// ── Resource connection envelope ─────────────────────────────────────────────

/// One frame on the duplex connection between relay and resource server.
///
/// Wire shape: `{"type": "...", "data": ..., "peerId": ..., "requestId": ...}`.
/// Unknown extra fields are ignored; an unknown `type` fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Relay → resource: a client's session description.
    #[serde(rename_all = "camelCase")]
    Offer {
        data: Value,
        /// `null` for one-shot offers that never trickle candidates.
        #[serde(default)]
        peer_id: Option<PeerId>,
        request_id: CorrelationKey,
    },

    /// Resource → relay: the answer for `request_id`.
    #[serde(rename_all = "camelCase")]
    Answer {
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        peer_id: Option<PeerId>,
        request_id: CorrelationKey,
    },

    /// An ICE candidate for an established peer. Either direction.
    #[serde(rename_all = "camelCase")]
    Candidate { data: Value, peer_id: PeerId },

    /// Keep-alive. Carries nothing and is dropped on receipt.
    Heartbeat,

    /// Peer connection-state change. Either direction.
    #[serde(rename_all = "camelCase")]
    State {
        data: PeerConnectionState,
        peer_id: PeerId,
    },

    /// Resource → relay: no answer will be produced for `request_id`.
    #[serde(rename_all = "camelCase")]
    Error {
        data: String,
        request_id: CorrelationKey,
    },
}

impl SignalingMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode as one text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Heartbeat => "heartbeat",
            Self::State { .. } => "state",
            Self::Error { .. } => "error",
        }
    }
}

// ── Client socket envelope ───────────────────────────────────────────────────

/// One frame on a browser's duplex socket.
///
/// Same `type`/`data`/`peerId` shape as [`SignalingMessage`] without
/// `requestId`: correlation keys never leave the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Client → relay.
    #[serde(rename_all = "camelCase")]
    Offer {
        data: Value,
        #[serde(default)]
        peer_id: Option<PeerId>,
    },

    /// Relay → client.
    #[serde(rename_all = "camelCase")]
    Answer { data: Value, peer_id: PeerId },

    /// Either direction. A client may omit `peerId` once its offer is answered.
    #[serde(rename_all = "camelCase")]
    Candidate {
        data: Value,
        #[serde(default)]
        peer_id: Option<PeerId>,
    },

    /// Relay → client: the peer connection changed state on the resource side.
    #[serde(rename_all = "camelCase")]
    State {
        data: PeerConnectionState,
        peer_id: PeerId,
    },

    Heartbeat,

    /// Relay → client: the last request failed.
    Error { data: String },
}
