//! Relay status and peer session commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    resource_attached: bool,
    link: Option<String>,
    pending_requests: usize,
    peers: usize,
    reply_timeout_ms: u64,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
struct PeerInfo {
    peer_id: String,
    state: String,
    link: String,
    age_secs: u64,
    buffered_candidates: usize,
    socket_client: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerCloseResponse {
    peer_id: String,
    closed: bool,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/api/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Switchboard Relay Status");
    println!("═══════════════════════════════════════");
    match (&resp.link, resp.resource_attached) {
        (Some(link), true) => println!("  Resource server  : attached ({})", link),
        _ => println!("  Resource server  : not connected"),
    }
    println!("  Pending requests : {}", resp.pending_requests);
    println!("  Peer sessions    : {}", resp.peers);
    println!("  Reply timeout    : {} ms", resp.reply_timeout_ms);
    println!("  Uptime           : {}s", resp.uptime_secs);

    Ok(())
}

pub async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/api/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peer sessions.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Peer Sessions ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        let transport = if p.socket_client { "socket" } else { "poll" };
        println!("  ┌─ {}", p.peer_id);
        println!("  │  state      : {}", p.state);
        println!("  │  link       : {}", p.link);
        println!("  │  client     : {}", transport);
        println!("  │  buffered   : {} candidates", p.buffered_candidates);
        println!("  └─ age        : {}s", p.age_secs);
    }

    Ok(())
}

pub async fn cmd_peer_drop(port: u16, peer_id: &str) -> Result<()> {
    let resp: PeerCloseResponse =
        delete_json(&format!("{}/client/peers/{}", base_url(port), peer_id)).await?;

    if resp.closed {
        println!("Closed peer session {}.", resp.peer_id);
    } else {
        println!("No open session for {}.", resp.peer_id);
    }

    Ok(())
}
