//! Duplex named-message channel
//!
//! The adapter owns one transport connection and exposes it as typed
//! subscribe/emit operations:
//! - `on_message` registers the single handler for an inbound message name
//! - `join_room` / `acknowledge` emit the two outbound messages the overlay uses
//! - `run` dispatches inbound frames in arrival order until the transport closes
//!
//! Wire framing lives in the transports (`websocket` speaks Socket.IO over
//! WebSocket, `memory` is an in-process pair used by tests and demos).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;
pub mod message_types;
pub mod socketio;
pub mod websocket;

pub use message_types::{names, AckToken, JoinOptions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("endpoint unreachable: {0}")]
    Connect(String),

    #[error("handshake not completed within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("namespace connect rejected: {0}")]
    Rejected(String),

    #[error("channel closed")]
    Closed,

    #[error("codec error: {0}")]
    Codec(String),
}

impl ChannelError {
    /// Failures that may clear up on a fresh connection attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChannelError::Connect(_) | ChannelError::HandshakeTimeout(_) | ChannelError::Closed
        )
    }
}

/// One named message travelling in either direction
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub name: String,
    pub args: Vec<Value>,
}

impl ChannelFrame {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// First argument, or `null` when the message carried none
    pub fn first_arg(&self) -> &Value {
        self.args.first().unwrap_or(&Value::Null)
    }
}

/// Outbound half of a duplex channel
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, frame: ChannelFrame) -> Result<(), ChannelError>;
}

/// Sink for completion signals of processed envelopes
#[async_trait]
pub trait Acknowledger: Send + Sync + 'static {
    async fn acknowledge(&self, token: AckToken) -> Result<(), ChannelError>;
}

pub type MessageHandler = Arc<dyn Fn(ChannelFrame) + Send + Sync>;

/// Cloneable emit side of a connected channel
#[derive(Clone)]
pub struct ChannelEmitter {
    transport: Arc<dyn Transport>,
}

impl ChannelEmitter {
    pub async fn emit(&self, name: &str, args: Vec<Value>) -> Result<(), ChannelError> {
        tracing::debug!(message = name, "emit");
        self.transport.send(ChannelFrame::new(name, args)).await
    }

    /// Ask the source to attach this connection to a room.
    ///
    /// The outcome arrives later as `setUniqueIdSuccess` or
    /// `setUniqueIdFailed`; neither is retried here.
    pub async fn join_room(
        &self,
        room_identifier: &str,
        options: &JoinOptions,
    ) -> Result<(), ChannelError> {
        tracing::info!(room = room_identifier, "requesting room join");
        self.emit(
            names::SET_UNIQUE_ID,
            vec![json!(room_identifier), json!(options)],
        )
        .await
    }
}

#[async_trait]
impl Acknowledger for ChannelEmitter {
    async fn acknowledge(&self, token: AckToken) -> Result<(), ChannelError> {
        self.emit(names::MESSAGE_PROCESSED, vec![token.into_value()])
            .await
    }
}

/// A connected channel plus its inbound handler table
pub struct ChannelAdapter {
    emitter: ChannelEmitter,
    handlers: HashMap<String, MessageHandler>,
    inbound: mpsc::Receiver<ChannelFrame>,
}

impl ChannelAdapter {
    /// Wrap an already established transport and its inbound frame stream
    pub fn from_transport(
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<ChannelFrame>,
    ) -> Self {
        Self {
            emitter: ChannelEmitter { transport },
            handlers: HashMap::new(),
            inbound,
        }
    }

    /// Open a Socket.IO connection to `endpoint`
    pub async fn connect(
        endpoint: &str,
        options: &websocket::ConnectOptions,
    ) -> Result<Self, ChannelError> {
        let (transport, inbound) = websocket::SocketIoTransport::connect(endpoint, options).await?;
        Ok(Self::from_transport(Arc::new(transport), inbound))
    }

    pub fn emitter(&self) -> ChannelEmitter {
        self.emitter.clone()
    }

    /// Register the handler for `name`, replacing any previous one
    pub fn on_message<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(ChannelFrame) + Send + Sync + 'static,
    {
        if self
            .handlers
            .insert(name.to_string(), Arc::new(handler))
            .is_some()
        {
            tracing::debug!(message = name, "replaced existing handler");
        }
    }

    pub async fn join_room(
        &self,
        room_identifier: &str,
        options: &JoinOptions,
    ) -> Result<(), ChannelError> {
        self.emitter.join_room(room_identifier, options).await
    }

    pub async fn acknowledge(&self, token: AckToken) -> Result<(), ChannelError> {
        self.emitter.acknowledge(token).await
    }

    /// Deliver inbound frames to their handlers until the transport closes
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Like `run`, but also stops once `shutdown` completes.
    ///
    /// A frame already handed to its handler is never interrupted; the
    /// shutdown is observed before the next frame is taken.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("dispatch stopped on request");
                    return;
                }
                frame = self.inbound.recv() => match frame {
                    Some(frame) => match self.handlers.get(&frame.name) {
                        Some(handler) => handler(frame),
                        None => tracing::debug!(message = %frame.name, "no handler registered"),
                    },
                    None => break,
                },
            }
        }
        tracing::info!("channel closed, dispatch loop finished");
    }
}
