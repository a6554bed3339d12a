use std::time::Duration;

use crate::*;

#[tokio::test]
async fn test_health() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(1)).await?;
    let (status, body) = relay.get("/health").await?;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn test_status_tracks_resource_attachment() -> Result<()> {
    let relay = TestRelay::start(Duration::from_millis(1500)).await?;

    let (_, before) = relay.get("/api/status").await?;
    assert_eq!(before["resource_attached"], false);
    assert!(before["link"].is_null());
    assert_eq!(before["reply_timeout_ms"], 1500);

    let resource = FakeResource::connect(&relay).await?;
    let (_, during) = relay.get("/api/status").await?;
    assert_eq!(during["resource_attached"], true);
    assert_eq!(during["pending_requests"], 0);
    assert_eq!(during["peers"], 0);

    resource.close().await?;
    relay.wait_attached(false).await?;
    let (_, after) = relay.get("/api/status").await?;
    assert_eq!(after["resource_attached"], false);
    Ok(())
}

#[tokio::test]
async fn test_ice_servers_served_from_config() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(1)).await?;
    let (status, body) = relay.get("/client/ice-servers").await?;
    assert_eq!(status, 200);

    let servers = body["iceServers"].as_array().context("iceServers array")?;
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["urls"][0], "stun:stun.l.google.com:19302");
    assert!(servers[0].get("username").is_none());
    Ok(())
}

#[tokio::test]
async fn test_empty_peer_list() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(1)).await?;
    let (status, body) = relay.get("/api/peers").await?;
    assert_eq!(status, 200);
    assert_eq!(body["peers"], serde_json::json!([]));
    Ok(())
}
