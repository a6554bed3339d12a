//! Offer and ICE server commands, for poking the relay by hand.

use std::io::Read;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::{base_url, get_json, post_json_body};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OfferBody {
    offer: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferResponse {
    answer: Value,
    peer_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IceServersResponse {
    ice_servers: Vec<IceServer>,
}

#[derive(Deserialize)]
struct IceServer {
    urls: Vec<String>,
    username: Option<String>,
}

/// Read an offer from `source` (`-` = stdin). JSON is sent as-is, anything
/// else as a raw SDP string.
fn read_offer(source: &str) -> Result<Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read offer from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read {}", source))?
    };
    Ok(parse_offer(&text))
}

fn parse_offer(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

pub async fn cmd_offer(port: u16, source: &str, peer_id: Option<&str>) -> Result<()> {
    let body = OfferBody {
        offer: read_offer(source)?,
        peer_id: peer_id.map(str::to_string),
    };
    let resp: OfferResponse =
        post_json_body(&format!("{}/client/offer", base_url(port)), &body).await?;

    if let Some(peer) = &resp.peer_id {
        eprintln!("peer session: {}", peer);
    }
    match resp.answer {
        Value::String(sdp) => println!("{}", sdp),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }

    Ok(())
}

pub async fn cmd_ice(port: u16) -> Result<()> {
    let resp: IceServersResponse =
        get_json(&format!("{}/client/ice-servers", base_url(port))).await?;

    if resp.ice_servers.is_empty() {
        println!("No ICE servers configured.");
        return Ok(());
    }

    for s in &resp.ice_servers {
        match &s.username {
            Some(user) => println!("  {} (user: {})", s.urls.join(", "), user),
            None => println!("  {}", s.urls.join(", ")),
        }
    }

    Ok(())
}
