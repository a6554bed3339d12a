//! Background upkeep: heartbeats to the resource server and expiry of
//! sessions whose answer never came.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;

use switchboard_services::SignalingRelay;

/// Keeps the resource connection warm.
pub struct Heartbeater {
    relay: SignalingRelay,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl Heartbeater {
    pub fn new(relay: SignalingRelay, interval: Duration, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            relay,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("heartbeater shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if self.relay.heartbeat().await {
                        tracing::trace!("heartbeat queued");
                    }
                }
            }
        }
    }
}

/// Closes peer sessions stuck in `pending`.
pub struct SessionReaper {
    relay: SignalingRelay,
    max_age: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl SessionReaper {
    pub fn new(relay: SignalingRelay, max_age: Duration, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            relay,
            max_age,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(sweep_period(self.max_age));

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("session reaper shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let expired = self.relay.peers().expire_pending(self.max_age);
                    for peer in &expired {
                        tracing::warn!(peer = %peer, max_age = ?self.max_age, "expired pending peer session");
                    }
                }
            }
        }
    }
}

/// Sweep a few times per max age, but not in a busy loop.
fn sweep_period(max_age: Duration) -> Duration {
    (max_age / 4).max(Duration::from_millis(250))
}
