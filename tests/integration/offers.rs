use std::time::Duration;

use serde_json::json;

use crate::*;

/// Browser posts an offer, the resource answers, the browser gets it back.
#[tokio::test]
async fn test_offer_round_trip() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;

    let caller = relay.spawn_offer(json!({"offer": "<sdp-a>"}));

    let forwarded = resource.recv_raw().await?;
    assert_eq!(forwarded["type"], "offer");
    assert_eq!(forwarded["data"], "<sdp-a>");
    assert!(forwarded["peerId"].is_null());
    let key = forwarded["requestId"]
        .as_u64()
        .context("requestId must be an integer")?;

    resource
        .send_raw(&json!({"type": "answer", "data": "<sdp-b>", "requestId": key}).to_string())
        .await?;

    let (status, body) = caller.await??;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"answer": "<sdp-b>"}));
    assert_eq!(relay.relay.pending_requests(), 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_offers_answered_out_of_order() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(3)).await?;
    let mut resource = FakeResource::connect(&relay).await?;

    let first = relay.spawn_offer(json!({"offer": "offer-1"}));
    let (data_1, _, key_1) = resource.recv_offer().await?;
    let second = relay.spawn_offer(json!({"offer": "offer-2"}));
    let (data_2, _, key_2) = resource.recv_offer().await?;
    assert_eq!(data_1, json!("offer-1"));
    assert_eq!(data_2, json!("offer-2"));

    resource.answer(key_2, json!("answer-2")).await?;
    resource.answer(key_1, json!("answer-1")).await?;

    assert_eq!(first.await??, (200, json!({"answer": "answer-1"})));
    assert_eq!(second.await??, (200, json!({"answer": "answer-2"})));
    Ok(())
}

#[tokio::test]
async fn test_offer_with_peer_id_opens_session() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;

    let caller = relay.spawn_offer(json!({"offer": {"type": "offer", "sdp": "v=0"}, "peerId": "p1"}));
    let (data, peer_id, key) = resource.recv_offer().await?;
    assert_eq!(data["sdp"], "v=0");
    assert_eq!(peer_id, Some(PeerId::from("p1")));

    resource
        .answer(key, json!({"type": "answer", "sdp": "v=0"}))
        .await?;
    let (status, body) = caller.await??;
    assert_eq!(status, 200);
    assert_eq!(body["peerId"], "p1");
    assert_eq!(body["answer"]["type"], "answer");

    let (_, peers) = relay.get("/api/peers").await?;
    assert_eq!(peers["peers"][0]["peer_id"], "p1");
    assert_eq!(peers["peers"][0]["state"], "active");
    Ok(())
}

#[tokio::test]
async fn test_peer_id_reusable_after_close() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;

    for round in 0..2 {
        let caller = relay.spawn_offer(json!({"offer": format!("o{round}"), "peerId": "again"}));
        let (_, _, key) = resource.recv_offer().await?;
        resource.answer(key, json!(format!("a{round}"))).await?;
        assert_eq!(caller.await??.0, 200);

        let (status, body) = relay.delete("/client/peers/again").await?;
        assert_eq!(status, 200);
        assert_eq!(body["closed"], true);

        // The resource is told the peer is gone.
        let closed = resource.recv_raw().await?;
        assert_eq!(closed, json!({"type": "state", "data": "closed", "peerId": "again"}));
    }

    let (_, body) = relay.delete("/client/peers/again").await?;
    assert_eq!(body["closed"], false);
    Ok(())
}
