//! Signaling relay — forwards client offers to the resource server and
//! routes its answers back to whoever is waiting.
//!
//! One resource server is attached at a time. Its read side runs through
//! [`SignalingRelay::run_reader`]; its write side is a [`DownstreamLink`]
//! drained by a writer task owned by the transport adapter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use switchboard_core::{CorrelationKey, PeerId, SignalingMessage};

use crate::correlation::CorrelationRegistry;
use crate::error::{PeerError, RegistryError, RelayError};
use crate::link::{DownstreamLink, LinkId};
use crate::peer::{ClientSink, PeerRegistry, PeerSession};

/// What the resource server sent back for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Answer(Value),
    Rejected(String),
}

/// One client offer on its way downstream.
#[derive(Debug, Clone)]
pub struct OfferRequest {
    pub data: Value,
    /// `None` for one-shot offers that never trickle candidates.
    pub peer_id: Option<PeerId>,
    pub sink: ClientSink,
}

impl OfferRequest {
    pub fn oneshot(data: Value) -> Self {
        Self {
            data,
            peer_id: None,
            sink: ClientSink::Poll,
        }
    }

    pub fn for_peer(data: Value, peer_id: PeerId, sink: ClientSink) -> Self {
        Self {
            data,
            peer_id: Some(peer_id),
            sink,
        }
    }
}

/// Status snapshot for the operator API.
#[derive(Debug, Clone)]
pub struct RelaySnapshot {
    pub link: Option<LinkId>,
    pub pending_requests: usize,
    pub peers: Vec<PeerSession>,
}

#[derive(Clone)]
pub struct SignalingRelay {
    pending: CorrelationRegistry<Reply>,
    peers: PeerRegistry,
    link: Arc<RwLock<Option<DownstreamLink>>>,
    reply_timeout: Duration,
}

impl SignalingRelay {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            pending: CorrelationRegistry::new(),
            peers: PeerRegistry::new(),
            link: Arc::new(RwLock::new(None)),
            reply_timeout,
        }
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    // ── Downstream link lifecycle ────────────────────────────────────────────

    /// Claim the downstream slot for a newly connected resource server.
    /// Returns the queue its writer task must drain.
    pub async fn attach(
        &self,
    ) -> Result<(LinkId, mpsc::UnboundedReceiver<SignalingMessage>), RelayError> {
        let mut slot = self.link.write().await;
        if let Some(current) = slot.as_ref() {
            tracing::warn!(link = %current.id(), "resource server already attached; refusing another");
            return Err(RelayError::AlreadyAttached);
        }
        let (link, rx) = DownstreamLink::channel();
        let id = link.id();
        *slot = Some(link);
        tracing::info!(link = %id, "resource server attached");
        Ok((id, rx))
    }

    /// Release the downstream slot. Every in-flight request fails with
    /// `TransportDown` and every session on the link is closed.
    /// Safe to call more than once.
    pub async fn detach(&self, link: LinkId) {
        let mut slot = self.link.write().await;
        match slot.as_ref() {
            Some(current) if current.id() == link => *slot = None,
            _ => return,
        }

        // Offers are only registered under the read lock with `link` in the
        // slot, so every pending waiter belongs to it. Holding the write lock
        // keeps late offers off the old queue and the next link out.
        let cancelled = self.pending.cancel_all();
        let closed = self.peers.close_link(link);
        drop(slot);

        tracing::info!(
            link = %link,
            cancelled,
            closed_peers = closed.len(),
            "resource server detached"
        );
    }

    pub async fn is_attached(&self) -> bool {
        self.link.read().await.is_some()
    }

    async fn current_link(&self) -> Option<DownstreamLink> {
        self.link.read().await.clone()
    }

    // ── Client → resource ────────────────────────────────────────────────────

    /// Forward an offer and wait for the matching answer.
    ///
    /// Holds a waiter for at most `reply_timeout`. If this future is dropped
    /// early the waiter and any peer session it opened are released.
    pub async fn send(&self, request: OfferRequest) -> Result<Value, RelayError> {
        let key = CorrelationKey::random();

        let (mut waiter, mut guard) = {
            let slot = self.link.read().await;
            let link = slot.as_ref().ok_or(RelayError::TransportDown)?;

            if let Some(peer_id) = &request.peer_id {
                self.peers
                    .create_session(peer_id.clone(), key, link.clone(), request.sink)?;
            }

            let waiter = match self.pending.register(key) {
                Ok(w) => w,
                Err(_) => {
                    tracing::error!(request_id = %key, "correlation key collision");
                    if let Some(peer_id) = &request.peer_id {
                        self.peers.discard(peer_id, key);
                    }
                    return Err(RelayError::DuplicateKey(key));
                }
            };
            let guard = PendingGuard {
                relay: self,
                key,
                peer_id: request.peer_id.clone(),
                armed: true,
            };

            link.push(SignalingMessage::Offer {
                data: request.data,
                peer_id: request.peer_id.clone(),
                request_id: key,
            })?;
            (waiter, guard)
        };
        tracing::debug!(request_id = %key, peer = ?request.peer_id, "offer forwarded");

        let outcome = match tokio::time::timeout(self.reply_timeout, &mut waiter).await {
            Ok(outcome) => outcome,
            // Whoever removes the entry decides. If the reader got there
            // first the reply is already in the channel.
            Err(_) => match self.pending.cancel(key) {
                Ok(()) => {
                    tracing::warn!(request_id = %key, timeout = ?self.reply_timeout, "no answer in time");
                    return Err(RelayError::Timeout(self.reply_timeout));
                }
                Err(_) => waiter.await,
            },
        };

        let answer = match outcome {
            Ok(Reply::Answer(answer)) => answer,
            Ok(Reply::Rejected(reason)) => return Err(RelayError::Rejected(reason)),
            Err(_) => return Err(RelayError::TransportDown),
        };

        if let Some(peer_id) = &request.peer_id {
            self.peers.activate(peer_id, key, &answer)?;
        }
        guard.disarm();
        Ok(answer)
    }

    /// Client → resource candidate for an open session.
    pub fn forward_candidate(&self, peer_id: &PeerId, candidate: Value) -> Result<(), PeerError> {
        self.peers.forward_candidate(peer_id, candidate)
    }

    /// Client hung up or asked to close.
    pub fn close_peer(&self, peer_id: &PeerId) -> Option<PeerSession> {
        self.peers.close(peer_id)
    }

    /// Queue a heartbeat on the attached link, if any.
    pub async fn heartbeat(&self) -> bool {
        match self.current_link().await {
            Some(link) => match link.push(SignalingMessage::Heartbeat) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "heartbeat not queued");
                    false
                }
            },
            None => false,
        }
    }

    // ── Resource → relay ─────────────────────────────────────────────────────

    /// Consume inbound frames from the attached resource server until the
    /// stream ends or fails, then detach `link`.
    pub async fn run_reader<S, E>(&self, link: LinkId, mut frames: S)
    where
        S: Stream<Item = Result<String, E>> + Unpin,
        E: fmt::Display,
    {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(text) => self.route_inbound(&text),
                Err(e) => {
                    tracing::warn!(link = %link, error = %e, "resource read failed");
                    break;
                }
            }
        }
        self.detach(link).await;
    }

    /// Route one inbound frame. Malformed or unexpected frames are logged
    /// and dropped; nothing here ends the connection.
    pub fn route_inbound(&self, text: &str) {
        let msg = match SignalingMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame from resource server");
                return;
            }
        };

        match msg {
            SignalingMessage::Answer {
                data, request_id, ..
            } => self.resolve(request_id, Reply::Answer(data)),
            SignalingMessage::Error { data, request_id } => {
                self.resolve(request_id, Reply::Rejected(data))
            }
            SignalingMessage::Candidate { data, peer_id } => {
                if let Err(e) = self.peers.deliver_candidate(&peer_id, data) {
                    tracing::debug!(error = %e, "candidate not delivered");
                }
            }
            SignalingMessage::State { data, peer_id } => {
                match self.peers.report_state(&peer_id, data) {
                    Ok(Some(_)) => {
                        tracing::info!(peer = %peer_id, state = ?data, "peer closed by resource server")
                    }
                    Ok(None) => tracing::debug!(peer = %peer_id, state = ?data, "peer state"),
                    Err(e) => tracing::debug!(error = %e, "state for unknown peer"),
                }
            }
            SignalingMessage::Heartbeat => tracing::trace!("heartbeat from resource server"),
            SignalingMessage::Offer { .. } => {
                tracing::warn!("resource server sent an offer; relay only forwards offers downstream")
            }
        }
    }

    fn resolve(&self, key: CorrelationKey, reply: Reply) {
        match self.pending.fulfill(key, reply) {
            Ok(()) => tracing::debug!(request_id = %key, "reply delivered"),
            Err(RegistryError::Abandoned(_)) => {
                tracing::info!(request_id = %key, "reply arrived after caller gave up; discarded")
            }
            Err(e) => tracing::warn!(error = %e, "discarding unmatched reply"),
        }
    }

    pub async fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            link: self.current_link().await.map(|l| l.id()),
            pending_requests: self.pending.pending_count(),
            peers: self.peers.sessions(),
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.pending_count()
    }
}

/// Releases a request's waiter and peer session unless the request
/// completed. Runs on every early return and when the caller's future is
/// dropped mid-wait.
struct PendingGuard<'a> {
    relay: &'a SignalingRelay,
    key: CorrelationKey,
    peer_id: Option<PeerId>,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.relay.pending.cancel(self.key).is_ok() {
            tracing::debug!(request_id = %self.key, "abandoned request released");
        }
        if let Some(peer_id) = &self.peer_id {
            self.relay.peers.close_if(peer_id, self.key);
        }
    }
}
