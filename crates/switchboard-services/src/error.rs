//! Error taxonomy for the relay core.

use std::time::Duration;

use switchboard_core::{CorrelationKey, PeerId};

use crate::link::LinkId;
use crate::peer::PeerState;

/// Failures of the correlation registry. None of these are fatal to the
/// relay; the caller logs and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("correlation key {0} already has a live waiter")]
    DuplicateKey(CorrelationKey),
    #[error("no waiter registered for correlation key {0}")]
    NotFound(CorrelationKey),
    /// The waiter was removed, but its caller had already stopped listening.
    #[error("waiter for correlation key {0} was abandoned by its caller")]
    Abandoned(CorrelationKey),
    /// Observed by the waiting side when its entry is cancelled.
    #[error("waiter for correlation key {0} was cancelled")]
    Cancelled(CorrelationKey),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("peer {0} already has an open session")]
    AlreadyExists(PeerId),
    #[error("no open session for peer {0}")]
    NotFound(PeerId),
    #[error("peer {peer} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        peer: PeerId,
        from: PeerState,
        to: PeerState,
    },
    #[error("downstream connection for peer {0} is closed")]
    TransportDown(PeerId),
    #[error("client socket for peer {0} is gone")]
    ClientGone(PeerId),
}

/// Push onto a downstream link whose writer task has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("downstream link {0} is closed")]
pub struct LinkClosed(pub LinkId);

/// What a caller of [`crate::SignalingRelay::send`] can get back instead of an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("correlation key collision on {0}")]
    DuplicateKey(CorrelationKey),
    #[error("no answer from the resource server within {0:?}")]
    Timeout(Duration),
    #[error("resource server is not connected")]
    TransportDown,
    #[error("resource server could not answer: {0}")]
    Rejected(String),
    #[error("a resource server is already connected")]
    AlreadyAttached,
    #[error(transparent)]
    Peer(#[from] PeerError),
}

impl From<LinkClosed> for RelayError {
    fn from(_: LinkClosed) -> Self {
        RelayError::TransportDown
    }
}
