//! Socket.IO client transport over WebSocket

use super::socketio::{self, EnginePacket, SocketPacket};
use super::{ChannelError, ChannelFrame, Transport};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use resilience::{channel_connect_config, with_timeout};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const INBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Bound on TCP/TLS connect plus the Engine.IO and namespace handshake
    pub handshake_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: channel_connect_config().handshake.duration,
        }
    }
}

pub struct SocketIoTransport {
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for SocketIoTransport {
    async fn send(&self, frame: ChannelFrame) -> Result<(), ChannelError> {
        let text = EnginePacket::Message(SocketPacket::event(frame)).encode();
        self.outbound.send(text).map_err(|_| ChannelError::Closed)
    }
}

impl SocketIoTransport {
    /// Connect, complete the handshake on the default namespace and start
    /// the reader/writer tasks
    pub async fn connect(
        endpoint: &str,
        options: &ConnectOptions,
    ) -> Result<(Self, mpsc::Receiver<ChannelFrame>), ChannelError> {
        let url = socket_io_url(endpoint)?;
        let timeout = options.handshake_timeout;
        tracing::info!(url = %url, "connecting to event source");

        let (stream, _response) = with_timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ChannelError::HandshakeTimeout(timeout))?
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let (mut sink, mut source) = stream.split();
        let sid = with_timeout(timeout, handshake(&mut sink, &mut source))
            .await
            .map_err(|_| ChannelError::HandshakeTimeout(timeout))??;
        tracing::info!(sid = %sid, "socket.io session established");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        tokio::spawn(write_loop(sink, outbound_rx));
        tokio::spawn(read_loop(source, inbound_tx, outbound_tx.clone()));

        Ok((
            Self {
                outbound: outbound_tx,
            },
            inbound_rx,
        ))
    }
}

/// Build the Engine.IO websocket URL from an http(s) or ws(s) endpoint
pub fn socket_io_url(endpoint: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| ChannelError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChannelError::InvalidEndpoint(format!(
                "unsupported scheme {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::InvalidEndpoint(endpoint.to_string()))?;

    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/socket.io/");
    }
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");

    Ok(url)
}

async fn handshake(sink: &mut WsSink, source: &mut WsSource) -> Result<String, ChannelError> {
    let mut sid = None;

    while let Some(message) = source.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return Err(ChannelError::Closed),
            Ok(_) => continue,
            Err(e) => return Err(ChannelError::Connect(e.to_string())),
        };

        match socketio::decode(&text)? {
            EnginePacket::Open(open) => {
                tracing::debug!(
                    ping_interval_ms = open.ping_interval,
                    ping_timeout_ms = open.ping_timeout,
                    "engine.io open"
                );
                sid = Some(open.sid);
                send_text(sink, EnginePacket::Message(SocketPacket::connect_default()).encode())
                    .await?;
            }
            EnginePacket::Ping(data) => {
                send_text(sink, EnginePacket::Pong(data).encode()).await?;
            }
            EnginePacket::Message(SocketPacket::Connect { .. }) => {
                return sid.ok_or_else(|| {
                    ChannelError::Codec("namespace connect before engine open".into())
                });
            }
            EnginePacket::Message(SocketPacket::ConnectError { payload, .. }) => {
                let reason = payload
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string());
                return Err(ChannelError::Rejected(reason));
            }
            EnginePacket::Close => return Err(ChannelError::Closed),
            other => tracing::debug!(packet = ?other, "ignored during handshake"),
        }
    }

    Err(ChannelError::Closed)
}

async fn send_text(sink: &mut WsSink, text: String) -> Result<(), ChannelError> {
    sink.send(Message::Text(text))
        .await
        .map_err(|e| ChannelError::Connect(e.to_string()))
}

async fn write_loop(mut sink: WsSink, mut outbound: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::warn!(error = %e, "websocket write failed, stopping writer");
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut source: WsSource,
    inbound: mpsc::Sender<ChannelFrame>,
    outbound: mpsc::UnboundedSender<String>,
) {
    while let Some(message) = source.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                tracing::info!(frame = ?frame, "websocket closed by server");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "websocket read failed");
                break;
            }
        };

        let packet = match socketio::decode(&text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable packet");
                continue;
            }
        };

        match packet {
            EnginePacket::Ping(data) => {
                if outbound.send(EnginePacket::Pong(data).encode()).is_err() {
                    break;
                }
            }
            EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
                if inbound.send(ChannelFrame { name, args }).await.is_err() {
                    break;
                }
            }
            EnginePacket::Message(SocketPacket::Disconnect { .. }) | EnginePacket::Close => {
                tracing::info!("socket.io session closed by server");
                break;
            }
            other => tracing::debug!(packet = ?other, "ignored packet"),
        }
    }
}
