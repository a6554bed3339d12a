//! Correlation registry — pairs forwarded requests with their replies.
//!
//! Each outstanding request owns exactly one entry: a oneshot sender keyed
//! by its [`CorrelationKey`]. Whoever removes the entry decides the outcome.
//! `fulfill` removes it and delivers a value, `cancel` removes it and drops
//! the sender. Because DashMap removal is atomic per key, a racing
//! `fulfill`/`cancel` pair always has exactly one winner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use switchboard_core::CorrelationKey;

use crate::error::RegistryError;

/// Thread-safe map of outstanding requests. Cheap to clone.
pub struct CorrelationRegistry<T> {
    pending: Arc<DashMap<CorrelationKey, oneshot::Sender<T>>>,
}

impl<T> Clone for CorrelationRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
        }
    }
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CorrelationRegistry<T> {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Allocate a waiter for `key`.
    pub fn register(&self, key: CorrelationKey) -> Result<Waiter<T>, RegistryError> {
        match self.pending.entry(key) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateKey(key)),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(Waiter { key, rx })
            }
        }
    }

    /// Remove the waiter for `key` and hand it `reply`.
    ///
    /// `Abandoned` means the entry existed but its caller had already dropped
    /// the receiving side; the reply is discarded.
    pub fn fulfill(&self, key: CorrelationKey, reply: T) -> Result<(), RegistryError> {
        let (_, tx) = self
            .pending
            .remove(&key)
            .ok_or(RegistryError::NotFound(key))?;
        tx.send(reply).map_err(|_| RegistryError::Abandoned(key))
    }

    /// Remove the waiter for `key` without a value. The waiter observes
    /// [`RegistryError::Cancelled`].
    pub fn cancel(&self, key: CorrelationKey) -> Result<(), RegistryError> {
        self.pending
            .remove(&key)
            .map(|_| ())
            .ok_or(RegistryError::NotFound(key))
    }

    /// Cancel every outstanding waiter. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<CorrelationKey> = self.pending.iter().map(|e| *e.key()).collect();
        keys.into_iter()
            .filter(|key| self.pending.remove(key).is_some())
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Receiving half of one registration. Resolves once, to the reply or to
/// `Cancelled`.
#[derive(Debug)]
pub struct Waiter<T> {
    key: CorrelationKey,
    rx: oneshot::Receiver<T>,
}

impl<T> Waiter<T> {
    pub fn key(&self) -> CorrelationKey {
        self.key
    }
}

impl<T> Future for Waiter<T> {
    type Output = Result<T, RegistryError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let key = self.key;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| RegistryError::Cancelled(key)))
    }
}
