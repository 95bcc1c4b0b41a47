//! Raw gateway client speaking the `{op, t, s, d}` envelope

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GatewayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub heartbeat_interval: u64,
    pub session_id: Option<String>,
    pub last_seq: Option<u64>,
}

impl GatewayClient {
    /// Connect and consume the Hello frame
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url).await?;
        let mut client = Self {
            ws,
            heartbeat_interval: 0,
            session_id: None,
            last_seq: None,
        };

        let hello = client.recv().await?;
        if hello["op"] != 10 {
            bail!("expected Hello, got {hello}");
        }
        client.heartbeat_interval = hello["d"]["heartbeat_interval"]
            .as_u64()
            .ok_or_else(|| anyhow!("Hello without heartbeat_interval"))?;
        Ok(client)
    }

    /// Connect, identify and wait for `ready`; returns its payload
    pub async fn identified(url: &str, token: &str) -> Result<(Self, Value)> {
        let mut client = Self::connect(url).await?;
        client.send_raw(json!({ "op": 2, "d": { "token": token } })).await?;
        let ready = client.wait_for("ready").await?;
        client.session_id = ready["session_id"].as_str().map(str::to_string);
        Ok((client, ready))
    }

    pub async fn send_raw(&mut self, frame: Value) -> Result<()> {
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    pub async fn send_event(&mut self, name: &str, data: Value) -> Result<()> {
        self.send_raw(json!({ "op": 3, "t": name, "d": data })).await
    }

    pub async fn join(&mut self, conversation_id: &str) -> Result<()> {
        self.send_event("join_conversation", json!({ "conversation_id": conversation_id }))
            .await
    }

    /// Round-trip a heartbeat; frames sent earlier on this socket have
    /// been handled once the ack arrives
    pub async fn sync(&mut self) -> Result<()> {
        let seq = self.last_seq;
        self.send_raw(json!({ "op": 1, "d": seq })).await?;
        loop {
            if self.recv().await?["op"] == 11 {
                return Ok(());
            }
        }
    }

    /// Join and wait until the gateway has processed it
    pub async fn join_synced(&mut self, conversation_id: &str) -> Result<()> {
        self.join(conversation_id).await?;
        self.sync().await
    }

    /// Next text frame as JSON
    pub async fn recv(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for a frame"))?
                .ok_or_else(|| anyhow!("gateway closed the stream"))??;

            match message {
                Message::Text(text) => {
                    let frame: Value = serde_json::from_str(&text)?;
                    if let Some(seq) = frame["s"].as_u64() {
                        self.last_seq = Some(seq);
                    }
                    return Ok(frame);
                }
                Message::Close(frame) => {
                    bail!(
                        "gateway closed with {}",
                        frame.map_or(0, |f| u16::from(f.code))
                    );
                }
                _ => {}
            }
        }
    }

    /// Skip frames until dispatch `name` arrives; returns its `d`
    pub async fn wait_for(&mut self, name: &str) -> Result<Value> {
        loop {
            let frame = self.recv().await?;
            if frame["op"] == 0 && frame["t"] == name {
                return Ok(frame["d"].clone());
            }
        }
    }

    /// Whether dispatch `name` arrives within `window`
    pub async fn receives_within(&mut self, name: &str, window: Duration) -> bool {
        tokio::time::timeout(window, self.wait_for(name))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    /// Close code the server ends the connection with
    pub async fn close_code(&mut self) -> Result<u16> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for close"))?;

            match message {
                Some(Ok(Message::Close(frame))) => {
                    return Ok(frame.map_or(1005, |f| u16::from(f.code)));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => bail!("socket error before close: {e}"),
                None => bail!("stream ended without a close frame"),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
