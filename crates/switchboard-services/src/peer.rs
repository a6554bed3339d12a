//! Peer registry — one session per negotiated browser peer.
//!
//! A session ties a [`PeerId`] to the downstream link its offer went out on
//! and to wherever the client wants candidates delivered. Sessions move
//! `Pending → Active → Closed`; closed sessions are removed from the map, so
//! a peer id can be negotiated again once its previous session is gone.
//!
//! Each session also carries the correlation key of the offer that opened
//! it. A request only ever activates or closes the session it opened, never
//! a newer one that reuses the peer id.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use switchboard_core::{ClientFrame, CorrelationKey, PeerConnectionState, PeerId, SignalingMessage};

use crate::error::PeerError;
use crate::link::{DownstreamLink, LinkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Offer forwarded, answer not yet seen.
    Pending,
    /// Answer delivered; candidates flow both ways.
    Active,
    /// Terminal.
    Closed,
}

impl PeerState {
    pub fn can_transition_to(self, next: PeerState) -> bool {
        matches!(
            (self, next),
            (PeerState::Pending, PeerState::Active)
                | (PeerState::Pending, PeerState::Closed)
                | (PeerState::Active, PeerState::Closed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeerState::Pending => "pending",
            PeerState::Active => "active",
            PeerState::Closed => "closed",
        }
    }
}

/// Where candidates from the resource server end up.
#[derive(Debug, Clone)]
pub enum ClientSink {
    /// Buffered until the client collects them with `take_candidates`.
    Poll,
    /// Pushed onto the client's socket as they arrive.
    Socket(mpsc::UnboundedSender<ClientFrame>),
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSession {
    pub peer_id: PeerId,
    pub state: PeerState,
    pub link: LinkId,
    pub age: Duration,
    /// Candidates held for the client: early ones while pending, undelivered
    /// ones for polling clients.
    pub buffered_candidates: usize,
    pub socket_client: bool,
}

struct PeerEntry {
    /// Key of the offer that opened this session.
    token: CorrelationKey,
    state: PeerState,
    downstream: DownstreamLink,
    sink: ClientSink,
    created_at: Instant,
    /// Candidate and state frames that arrived before the answer, in order.
    early: Vec<ClientFrame>,
    /// Candidates waiting for a polling client.
    outbox: Vec<Value>,
    /// The resource server already reported a terminal state.
    terminated: bool,
}

impl PeerEntry {
    fn snapshot(&self, peer_id: &PeerId) -> PeerSession {
        let early_candidates = self
            .early
            .iter()
            .filter(|f| matches!(f, ClientFrame::Candidate { .. }))
            .count();
        PeerSession {
            peer_id: peer_id.clone(),
            state: self.state,
            link: self.downstream.id(),
            age: self.created_at.elapsed(),
            buffered_candidates: early_candidates + self.outbox.len(),
            socket_client: matches!(self.sink, ClientSink::Socket(_)),
        }
    }

    fn push_to_client(&self, peer_id: &PeerId, frame: ClientFrame) -> Result<(), PeerError> {
        match &self.sink {
            ClientSink::Socket(tx) => tx
                .send(frame)
                .map_err(|_| PeerError::ClientGone(peer_id.clone())),
            ClientSink::Poll => Ok(()),
        }
    }
}

/// Shared between the relay reader, request handlers, and the expiry loop.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    sessions: Arc<DashMap<PeerId, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending session owned by the offer keyed `token`. A peer id
    /// with a live session is rejected.
    pub fn create_session(
        &self,
        peer_id: PeerId,
        token: CorrelationKey,
        downstream: DownstreamLink,
        sink: ClientSink,
    ) -> Result<PeerSession, PeerError> {
        match self.sessions.entry(peer_id.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!(peer = %peer_id, "rejecting second session for live peer");
                Err(PeerError::AlreadyExists(peer_id))
            }
            Entry::Vacant(slot) => {
                let entry = PeerEntry {
                    token,
                    state: PeerState::Pending,
                    downstream,
                    sink,
                    created_at: Instant::now(),
                    early: Vec::new(),
                    outbox: Vec::new(),
                    terminated: false,
                };
                let session = entry.snapshot(&peer_id);
                slot.insert(entry);
                tracing::debug!(peer = %peer_id, link = %session.link, "peer session opened");
                Ok(session)
            }
        }
    }

    pub fn lookup(&self, peer_id: &PeerId) -> Result<PeerSession, PeerError> {
        self.sessions
            .get(peer_id)
            .map(|e| e.snapshot(peer_id))
            .ok_or_else(|| PeerError::NotFound(peer_id.clone()))
    }

    /// Client → resource. Allowed while pending; browsers trickle early.
    pub fn forward_candidate(&self, peer_id: &PeerId, candidate: Value) -> Result<(), PeerError> {
        let entry = self
            .sessions
            .get(peer_id)
            .ok_or_else(|| PeerError::NotFound(peer_id.clone()))?;
        entry
            .downstream
            .push(SignalingMessage::Candidate {
                data: candidate,
                peer_id: peer_id.clone(),
            })
            .map_err(|_| PeerError::TransportDown(peer_id.clone()))
    }

    /// Resource → client. Held back while pending so the client never sees
    /// a candidate before its answer.
    pub fn deliver_candidate(&self, peer_id: &PeerId, candidate: Value) -> Result<(), PeerError> {
        let mut guard = self
            .sessions
            .get_mut(peer_id)
            .ok_or_else(|| PeerError::NotFound(peer_id.clone()))?;
        let entry = &mut *guard;

        match entry.state {
            PeerState::Pending => {
                entry.early.push(ClientFrame::Candidate {
                    data: candidate,
                    peer_id: Some(peer_id.clone()),
                });
                Ok(())
            }
            PeerState::Active => match &entry.sink {
                ClientSink::Poll => {
                    entry.outbox.push(candidate);
                    Ok(())
                }
                ClientSink::Socket(_) => entry.push_to_client(
                    peer_id,
                    ClientFrame::Candidate {
                        data: candidate,
                        peer_id: Some(peer_id.clone()),
                    },
                ),
            },
            PeerState::Closed => Err(PeerError::NotFound(peer_id.clone())),
        }
    }

    /// Mark the session opened by `token` active once its answer is in hand.
    ///
    /// Socket clients get the answer frame and then everything that arrived
    /// early, all under the entry lock, so nothing can slip in between. If
    /// the resource server already reported a terminal state the session is
    /// closed right after the flush.
    pub fn activate(
        &self,
        peer_id: &PeerId,
        token: CorrelationKey,
        answer: &Value,
    ) -> Result<PeerSession, PeerError> {
        let (session, terminated) = {
            let mut guard = self
                .sessions
                .get_mut(peer_id)
                .filter(|e| e.token == token)
                .ok_or_else(|| PeerError::NotFound(peer_id.clone()))?;
            let entry = &mut *guard;

            if !entry.state.can_transition_to(PeerState::Active) {
                return Err(PeerError::InvalidTransition {
                    peer: peer_id.clone(),
                    from: entry.state,
                    to: PeerState::Active,
                });
            }
            entry.state = PeerState::Active;
            let early = std::mem::take(&mut entry.early);

            match &entry.sink {
                ClientSink::Poll => entry.outbox.extend(early.into_iter().filter_map(|f| match f {
                    ClientFrame::Candidate { data, .. } => Some(data),
                    _ => None,
                })),
                ClientSink::Socket(_) => {
                    let answer = ClientFrame::Answer {
                        data: answer.clone(),
                        peer_id: peer_id.clone(),
                    };
                    for frame in std::iter::once(answer).chain(early) {
                        if entry.push_to_client(peer_id, frame).is_err() {
                            tracing::debug!(peer = %peer_id, "client socket gone before answer");
                            break;
                        }
                    }
                }
            }

            tracing::debug!(peer = %peer_id, "peer session active");
            (entry.snapshot(peer_id), entry.terminated)
        };

        if !terminated {
            return Ok(session);
        }
        Ok(self.close_if(peer_id, token).unwrap_or(session))
    }

    /// Drain candidates buffered for a polling client.
    pub fn take_candidates(&self, peer_id: &PeerId) -> Result<Vec<Value>, PeerError> {
        let mut entry = self
            .sessions
            .get_mut(peer_id)
            .ok_or_else(|| PeerError::NotFound(peer_id.clone()))?;
        Ok(std::mem::take(&mut entry.outbox))
    }

    /// Apply a connection-state report from the resource server.
    ///
    /// While pending the report is held with the early candidates and a
    /// terminal state only marks the session; `activate` or the request's
    /// own cleanup closes it. Once active, socket clients are told at once
    /// and a terminal state closes the session.
    pub fn report_state(
        &self,
        peer_id: &PeerId,
        state: PeerConnectionState,
    ) -> Result<Option<PeerSession>, PeerError> {
        let frame = ClientFrame::State {
            data: state,
            peer_id: peer_id.clone(),
        };
        {
            let mut guard = self
                .sessions
                .get_mut(peer_id)
                .ok_or_else(|| PeerError::NotFound(peer_id.clone()))?;
            let entry = &mut *guard;
            entry.terminated |= state.is_terminal();

            if entry.state == PeerState::Pending {
                entry.early.push(frame);
                return Ok(None);
            }
            if let Err(e) = entry.push_to_client(peer_id, frame) {
                tracing::debug!(error = %e, "state not delivered");
            }
        }

        if state.is_terminal() {
            Ok(self.remove(peer_id, false))
        } else {
            Ok(None)
        }
    }

    /// Close a session and tell the resource server. Closing an absent or
    /// already-closed session is a no-op returning `None`.
    pub fn close(&self, peer_id: &PeerId) -> Option<PeerSession> {
        self.remove(peer_id, true)
    }

    /// Close the session only if it is still the one opened by `token`.
    pub fn close_if(&self, peer_id: &PeerId, token: CorrelationKey) -> Option<PeerSession> {
        self.sessions
            .remove_if(peer_id, |_, e| e.token == token)
            .map(|(id, entry)| finish(id, entry, true))
    }

    /// Drop the session opened by `token` without telling the resource
    /// server, for offers that never went downstream.
    pub fn discard(&self, peer_id: &PeerId, token: CorrelationKey) -> Option<PeerSession> {
        self.sessions
            .remove_if(peer_id, |_, e| e.token == token)
            .map(|(id, entry)| finish(id, entry, false))
    }

    /// Close every session that went out on `link`. The link is gone, so
    /// nothing is sent downstream.
    pub fn close_link(&self, link: LinkId) -> Vec<PeerId> {
        let ids: Vec<PeerId> = self
            .sessions
            .iter()
            .filter(|e| e.downstream.id() == link)
            .map(|e| e.key().clone())
            .collect();
        ids.into_iter()
            .filter(|id| self.remove(id, false).is_some())
            .collect()
    }

    /// Close sessions that have been pending longer than `max_age`.
    pub fn expire_pending(&self, max_age: Duration) -> Vec<PeerId> {
        let stale = |e: &PeerEntry| e.state == PeerState::Pending && e.created_at.elapsed() > max_age;
        let ids: Vec<PeerId> = self
            .sessions
            .iter()
            .filter(|e| stale(e.value()))
            .map(|e| e.key().clone())
            .collect();

        ids.into_iter()
            .filter(|id| {
                self.sessions
                    .remove_if(id, |_, e| stale(e))
                    .map(|(id, entry)| finish(id, entry, true))
                    .is_some()
            })
            .collect()
    }

    pub fn sessions(&self) -> Vec<PeerSession> {
        self.sessions.iter().map(|e| e.snapshot(e.key())).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn remove(&self, peer_id: &PeerId, notify_downstream: bool) -> Option<PeerSession> {
        let (id, entry) = self.sessions.remove(peer_id)?;
        Some(finish(id, entry, notify_downstream))
    }
}

/// Mark a removed entry closed. The resource server is told unless it
/// ended the peer itself.
fn finish(peer_id: PeerId, mut entry: PeerEntry, notify_downstream: bool) -> PeerSession {
    if notify_downstream && !entry.terminated {
        let closed = SignalingMessage::State {
            data: PeerConnectionState::Closed,
            peer_id: peer_id.clone(),
        };
        if entry.downstream.push(closed).is_err() {
            tracing::debug!(peer = %peer_id, "downstream gone; close not forwarded");
        }
    }
    entry.state = PeerState::Closed;
    tracing::debug!(peer = %peer_id, "peer session closed");
    entry.snapshot(&peer_id)
}
