//! Duplex socket adapters.
//!
//! `/ws` carries the resource server; `/client/ws` carries browsers that
//! prefer pushed answers and candidates over polling. Each socket is split
//! into a writer task fed by a queue and a read loop on the caller's task.

use std::collections::HashSet;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{future, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use switchboard_core::{ClientFrame, PeerId};
use switchboard_services::{ClientSink, OfferRequest, SignalingRelay};

use crate::ApiState;

/// Text payload of one inbound frame, if it has one.
fn text_payload(msg: Result<Message, axum::Error>) -> Option<Result<String, axum::Error>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(text)),
            Err(_) => {
                tracing::warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                None
            }
        },
        Ok(_) => None,
        Err(e) => Some(Err(e)),
    }
}

// ── Resource server ───────────────────────────────────────────────────────────

pub async fn handle_resource_ws(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> Response {
    ws.on_upgrade(move |socket| resource_socket(socket, state.relay))
}

async fn resource_socket(mut socket: WebSocket, relay: SignalingRelay) {
    let (link, mut queue) = match relay.attach().await {
        Ok(attached) => attached,
        Err(e) => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let (mut sender, receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(msg) = queue.recv().await {
            let text = match msg.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, kind = msg.kind(), "failed to encode frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        tracing::debug!(link = %link, "resource writer ended");
    });

    let frames = receiver
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| future::ready(text_payload(msg)));

    tokio::select! {
        _ = relay.run_reader(link, frames) => {}
        _ = &mut writer => relay.detach(link).await,
    }
    writer.abort();
}

// ── Browser clients ───────────────────────────────────────────────────────────

pub async fn handle_client_ws(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| client_socket(socket, state.relay))
}

async fn client_socket(socket: WebSocket, relay: SignalingRelay) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientFrame>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Most recent peer, the default target for candidates without a peerId.
    let mut peer: Option<PeerId> = None;
    let mut opened: HashSet<PeerId> = HashSet::new();
    let mut offers: Vec<JoinHandle<()>> = Vec::new();

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Close(_)) => break,
            Ok(msg) => match text_payload(Ok(msg)) {
                Some(Ok(text)) => text,
                _ => continue,
            },
            Err(e) => {
                tracing::debug!(error = %e, "client socket read failed");
                break;
            }
        };

        let frame = match serde_json::from_str::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "malformed client frame");
                let _ = tx.send(ClientFrame::Error {
                    data: format!("malformed frame: {e}"),
                });
                continue;
            }
        };

        match frame {
            ClientFrame::Offer { data, peer_id } => {
                let peer_id = peer_id
                    .or_else(|| peer.clone())
                    .unwrap_or_else(PeerId::generate);
                peer = Some(peer_id.clone());
                opened.insert(peer_id.clone());
                offers.retain(|task| !task.is_finished());

                let relay = relay.clone();
                let tx = tx.clone();
                offers.push(tokio::spawn(async move {
                    let request =
                        OfferRequest::for_peer(data, peer_id, ClientSink::Socket(tx.clone()));
                    if let Err(e) = relay.send(request).await {
                        let _ = tx.send(ClientFrame::Error {
                            data: e.to_string(),
                        });
                    }
                }));
            }
            ClientFrame::Candidate { data, peer_id } => {
                let Some(target) = peer_id.or_else(|| peer.clone()) else {
                    let _ = tx.send(ClientFrame::Error {
                        data: "candidate before offer".to_string(),
                    });
                    continue;
                };
                if let Err(e) = relay.forward_candidate(&target, data) {
                    let _ = tx.send(ClientFrame::Error { data: e.to_string() });
                }
            }
            ClientFrame::State { data, peer_id } if data.is_terminal() => {
                if opened.remove(&peer_id) {
                    relay.close_peer(&peer_id);
                }
            }
            ClientFrame::Heartbeat | ClientFrame::State { .. } => {}
            other => tracing::debug!(frame = ?other, "ignoring relay-bound frame from client"),
        }
    }

    for task in offers {
        task.abort();
    }
    for peer_id in opened {
        if relay.close_peer(&peer_id).is_some() {
            tracing::info!(peer = %peer_id, "client socket closed");
        }
    }
    writer.abort();
}
