//! Switchboard integration test harness.
//!
//! Every test starts its own relay in-process on 127.0.0.1:0, drives it with
//! `reqwest` the way a browser would, and plays the resource server over a
//! real WebSocket. Nothing is shared between tests.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use switchboard_api::ApiState;
use switchboard_core::config::SwitchboardConfig;
use switchboard_core::{CorrelationKey, PeerId, SignalingMessage};
use switchboard_services::SignalingRelay;

mod candidates;
mod offers;
mod status;

/// How long any single frame may take to show up.
pub const FRAME_WAIT: Duration = Duration::from_secs(2);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Relay under test ──────────────────────────────────────────────────────────

pub struct TestRelay {
    pub relay: SignalingRelay,
    pub base: String,
    port: u16,
    server: JoinHandle<()>,
}

impl TestRelay {
    pub async fn start(reply_timeout: Duration) -> Result<Self> {
        let relay = SignalingRelay::new(reply_timeout);
        let state = ApiState::new(relay.clone(), SwitchboardConfig::default().ice.servers);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let server = tokio::spawn(async move {
            if let Err(e) = switchboard_api::serve_on(listener, state).await {
                eprintln!("relay server exited: {e}");
            }
        });

        Ok(Self {
            relay,
            base: format!("http://127.0.0.1:{port}"),
            port,
            server,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://127.0.0.1:{}{}", self.port, path)
    }

    /// POST a JSON body and return (status, parsed body or raw text).
    pub async fn post(&self, path: &str, body: &Value) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        read_response(resp).await
    }

    pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::get(self.url(path))
            .await
            .with_context(|| format!("GET {path}"))?;
        read_response(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .delete(self.url(path))
            .send()
            .await
            .with_context(|| format!("DELETE {path}"))?;
        read_response(resp).await
    }

    /// Fire an offer in the background, the way a browser waits on it.
    pub fn spawn_offer(&self, body: Value) -> JoinHandle<Result<(u16, Value)>> {
        let client = reqwest::Client::new();
        let url = self.url("/client/offer");
        tokio::spawn(async move {
            let resp = client.post(url).json(&body).send().await?;
            read_response(resp).await
        })
    }

    pub async fn wait_attached(&self, attached: bool) -> Result<()> {
        for _ in 0..200 {
            if self.relay.is_attached().await == attached {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        bail!("relay attached state never became {attached}")
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn read_response(resp: reqwest::Response) -> Result<(u16, Value)> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}

// ── Fake resource server ──────────────────────────────────────────────────────

pub struct FakeResource {
    ws: Socket,
}

impl FakeResource {
    /// Connect to `/ws` and wait until the relay has attached us.
    pub async fn connect(relay: &TestRelay) -> Result<Self> {
        let (ws, _) = connect_async(relay.ws_url("/ws"))
            .await
            .context("resource connect")?;
        relay.wait_attached(true).await?;
        Ok(Self { ws })
    }

    /// Next non-heartbeat frame as raw JSON.
    pub async fn recv_raw(&mut self) -> Result<Value> {
        loop {
            let text = next_text(&mut self.ws).await?;
            let value: Value = serde_json::from_str(&text)?;
            if value["type"] != "heartbeat" {
                return Ok(value);
            }
        }
    }

    pub async fn recv(&mut self) -> Result<SignalingMessage> {
        let raw = self.recv_raw().await?;
        Ok(SignalingMessage::decode(&raw.to_string())?)
    }

    pub async fn recv_offer(&mut self) -> Result<(Value, Option<PeerId>, CorrelationKey)> {
        match self.recv().await? {
            SignalingMessage::Offer {
                data,
                peer_id,
                request_id,
            } => Ok((data, peer_id, request_id)),
            other => bail!("expected offer, got {other:?}"),
        }
    }

    pub async fn send(&mut self, msg: &SignalingMessage) -> Result<()> {
        self.send_raw(&msg.encode()?).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    pub async fn answer(&mut self, key: CorrelationKey, data: Value) -> Result<()> {
        self.send(&SignalingMessage::Answer {
            data,
            peer_id: None,
            request_id: key,
        })
        .await
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

// ── Browser on the client socket ──────────────────────────────────────────────

pub struct ClientSocket {
    ws: Socket,
}

impl ClientSocket {
    pub async fn connect(relay: &TestRelay) -> Result<Self> {
        let (ws, _) = connect_async(relay.ws_url("/client/ws"))
            .await
            .context("client connect")?;
        Ok(Self { ws })
    }

    pub async fn send(&mut self, frame: Value) -> Result<()> {
        self.ws.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<Value> {
        let text = next_text(&mut self.ws).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Next text frame, or an error on close/timeout.
async fn next_text(ws: &mut Socket) -> Result<String> {
    loop {
        let msg = tokio::time::timeout(FRAME_WAIT, ws.next())
            .await
            .context("timed out waiting for a frame")?;
        match msg {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
            Some(Ok(Message::Close(frame))) => bail!("socket closed: {frame:?}"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => bail!("socket error: {e}"),
            None => bail!("socket ended"),
        }
    }
}
