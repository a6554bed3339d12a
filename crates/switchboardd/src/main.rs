//! switchboardd — WebRTC signaling relay daemon.

use std::time::Duration;

use anyhow::Result;

use switchboard_api::ApiState;
use switchboard_core::config::SwitchboardConfig;
use switchboard_services::SignalingRelay;

mod maintenance;

use maintenance::{Heartbeater, SessionReaper};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SwitchboardConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = SwitchboardConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SwitchboardConfig::default()
    });

    tracing::info!(
        bind = %config.network.bind_addr,
        port = config.network.http_port,
        reply_timeout_ms = config.relay.reply_timeout_ms,
        ice_servers = config.ice.servers.len(),
        "switchboardd starting"
    );

    let relay = SignalingRelay::new(config.relay.reply_timeout());

    // ── Shutdown channel ─────────────────────────────────────────────────────

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let heartbeat_task = tokio::spawn({
        let relay = relay.clone();
        let shutdown = shutdown_tx.subscribe();
        let interval = config.relay.heartbeat_interval();
        async move {
            match interval {
                Some(interval) => Heartbeater::new(relay, interval, shutdown).run().await,
                None => {
                    tracing::info!("heartbeats disabled");
                    std::future::pending().await
                }
            }
        }
    });

    let reaper_task = tokio::spawn({
        let relay = relay.clone();
        let shutdown = shutdown_tx.subscribe();
        let max_age = config.relay.pending_session_max_age();
        async move {
            match max_age {
                Some(max_age) => SessionReaper::new(relay, max_age, shutdown).run().await,
                None => std::future::pending().await,
            }
        }
    });

    let snapshot_printer = {
        let relay = relay.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let snapshot = relay.snapshot().await;
                tracing::info!(
                    attached = snapshot.link.is_some(),
                    pending = snapshot.pending_requests,
                    peers = snapshot.peers.len(),
                    "relay snapshot"
                );
                for p in &snapshot.peers {
                    tracing::debug!(
                        peer = %p.peer_id,
                        state = p.state.as_str(),
                        age_secs = p.age.as_secs(),
                        "  peer"
                    );
                }
            }
        })
    };

    let api_task = {
        let state = ApiState::new(relay.clone(), config.ice.servers.clone());
        let bind_addr = config.network.bind_addr.clone();
        let port = config.network.http_port;
        tokio::spawn(async move { switchboard_api::serve(state, &bind_addr, port).await })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = heartbeat_task      => tracing::error!("heartbeat task exited: {:?}", r),
        r = reaper_task         => tracing::error!("session reaper exited: {:?}", r),
        r = snapshot_printer    => tracing::error!("snapshot printer exited: {:?}", r),
        r = api_task            => tracing::error!("API server exited: {:?}", r),
    }

    Ok(())
}
