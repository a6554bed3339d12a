use std::time::Duration;

use serde_json::json;
use switchboard_core::PeerConnectionState;

use crate::*;

/// Open a polling peer session and answer it.
async fn negotiate(relay: &TestRelay, resource: &mut FakeResource, peer: &str) -> Result<()> {
    let caller = relay.spawn_offer(json!({"offer": "o", "peerId": peer}));
    let (_, _, key) = resource.recv_offer().await?;
    resource.answer(key, json!("a")).await?;
    let (status, _) = caller.await??;
    assert_eq!(status, 200);
    Ok(())
}

fn candidate_for(peer: &str, data: Value) -> SignalingMessage {
    SignalingMessage::Candidate {
        data,
        peer_id: PeerId::from(peer),
    }
}

#[tokio::test]
async fn test_client_candidate_reaches_resource() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;
    negotiate(&relay, &mut resource, "p1").await?;

    let (status, body) = relay
        .post(
            "/client/candidate",
            &json!({"peerId": "p1", "candidate": {"candidate": "candidate:1 1 udp 1 10.0.0.1 5000 typ host"}}),
        )
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body["forwarded"], true);

    let forwarded = resource.recv_raw().await?;
    assert_eq!(forwarded["type"], "candidate");
    assert_eq!(forwarded["peerId"], "p1");
    assert!(forwarded["data"]["candidate"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn test_candidate_for_unknown_peer_is_not_found() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let _resource = FakeResource::connect(&relay).await?;

    let (status, _) = relay
        .post("/client/candidate", &json!({"peerId": "ghost", "candidate": "c"}))
        .await?;
    assert_eq!(status, 404);

    let (status, _) = relay.get("/client/candidates/ghost").await?;
    assert_eq!(status, 404);
    Ok(())
}

/// Candidates sent before the answer are held, then delivered to the right
/// peer only.
#[tokio::test]
async fn test_resource_candidates_reach_only_their_peer() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;
    negotiate(&relay, &mut resource, "other").await?;

    let caller = relay.spawn_offer(json!({"offer": "o", "peerId": "p1"}));
    let (_, _, key) = resource.recv_offer().await?;

    resource.send(&candidate_for("p1", json!("early"))).await?;
    // Let the relay read the early candidate before the answer goes out.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (_, pending) = relay.get("/client/candidates/p1").await?;
    assert_eq!(pending["state"], "pending");
    assert_eq!(pending["candidates"], json!([]));

    resource.answer(key, json!("a")).await?;
    assert_eq!(caller.await??.0, 200);
    resource.send(&candidate_for("p1", json!("late"))).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = relay.get("/client/candidates/p1").await?;
    assert_eq!(status, 200);
    assert_eq!(body["state"], "active");
    assert_eq!(body["candidates"], json!(["early", "late"]));

    let (_, drained) = relay.get("/client/candidates/p1").await?;
    assert_eq!(drained["candidates"], json!([]));
    let (_, other) = relay.get("/client/candidates/other").await?;
    assert_eq!(other["candidates"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_failed_state_closes_peer() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;
    negotiate(&relay, &mut resource, "p1").await?;

    resource
        .send(&SignalingMessage::State {
            data: PeerConnectionState::Failed,
            peer_id: PeerId::from("p1"),
        })
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, _) = relay.get("/client/candidates/p1").await?;
    assert_eq!(status, 404);
    assert!(relay.relay.peers().is_empty());
    Ok(())
}

/// A socket client gets its answer pushed, then the candidates that raced
/// ahead of it, and the resource hears when the client goes away.
#[tokio::test]
async fn test_client_socket_session() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;
    let mut client = ClientSocket::connect(&relay).await?;

    client.send(json!({"type": "offer", "data": "<sdp-a>"})).await?;
    let (data, peer_id, key) = resource.recv_offer().await?;
    assert_eq!(data, json!("<sdp-a>"));
    let peer_id = peer_id.context("socket offers always carry a peer id")?;

    resource.send(&candidate_for(peer_id.as_str(), json!("c1"))).await?;
    resource.answer(key, json!("<sdp-b>")).await?;

    let answer = client.recv().await?;
    assert_eq!(answer["type"], "answer");
    assert_eq!(answer["data"], "<sdp-b>");
    assert_eq!(answer["peerId"], peer_id.as_str());
    let candidate = client.recv().await?;
    assert_eq!(candidate["type"], "candidate");
    assert_eq!(candidate["data"], "c1");

    // Client candidates may omit peerId once negotiated.
    client.send(json!({"type": "candidate", "data": "c2"})).await?;
    assert_eq!(
        resource.recv().await?,
        candidate_for(peer_id.as_str(), json!("c2"))
    );

    client.close().await?;
    assert_eq!(
        resource.recv().await?,
        SignalingMessage::State {
            data: PeerConnectionState::Closed,
            peer_id: peer_id.clone(),
        }
    );
    assert!(relay.relay.peers().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_client_socket_reports_failures() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut client = ClientSocket::connect(&relay).await?;

    client.send(json!({"type": "candidate", "data": "c"})).await?;
    let err = client.recv().await?;
    assert_eq!(err["type"], "error");

    client.send(json!({"type": "offer", "data": "x"})).await?;
    let err = client.recv().await?;
    assert_eq!(err["type"], "error");
    assert!(err["data"].as_str().unwrap_or_default().contains("not connected"));
    Ok(())
}

/// Every peer a socket negotiated is closed when the socket goes away, not
/// just the last one.
#[tokio::test]
async fn test_client_socket_closes_every_peer_it_opened() -> Result<()> {
    let relay = TestRelay::start(Duration::from_secs(2)).await?;
    let mut resource = FakeResource::connect(&relay).await?;
    let mut client = ClientSocket::connect(&relay).await?;

    for peer in ["first", "second"] {
        client
            .send(json!({"type": "offer", "data": "o", "peerId": peer}))
            .await?;
        let (_, peer_id, key) = resource.recv_offer().await?;
        assert_eq!(peer_id, Some(PeerId::from(peer)));
        resource.answer(key, json!("a")).await?;

        let answer = client.recv().await?;
        assert_eq!(answer["type"], "answer");
        assert_eq!(answer["peerId"], peer);
    }
    assert_eq!(relay.relay.peers().len(), 2);

    client.close().await?;
    let mut closed = Vec::new();
    for _ in 0..2 {
        match resource.recv().await? {
            SignalingMessage::State {
                data: PeerConnectionState::Closed,
                peer_id,
            } => closed.push(peer_id),
            other => bail!("expected a close, got {other:?}"),
        }
    }
    closed.sort();
    assert_eq!(closed, vec![PeerId::from("first"), PeerId::from("second")]);
    assert!(relay.relay.peers().is_empty());
    Ok(())
}
