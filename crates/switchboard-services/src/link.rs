//! Downstream link — the write side of one resource-server connection.
//!
//! Writes are never made on the socket directly. Everything destined for the
//! resource server is queued here and drained by the connection's single
//! writer task, so frames from concurrent callers never interleave.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use switchboard_core::SignalingMessage;

use crate::error::LinkClosed;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local identifier of one resource-server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    fn next() -> Self {
        Self(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Cloneable handle that queues frames for one resource connection.
#[derive(Debug, Clone)]
pub struct DownstreamLink {
    id: LinkId,
    tx: mpsc::UnboundedSender<SignalingMessage>,
}

impl DownstreamLink {
    /// Create a link and the queue its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SignalingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: LinkId::next(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Queue a frame. Fails only once the writer task has gone away.
    pub fn push(&self, msg: SignalingMessage) -> Result<(), LinkClosed> {
        self.tx.send(msg).map_err(|_| LinkClosed(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
