//! In-process channel pair
//!
//! `pair()` returns a transport for the adapter and the remote end that plays
//! the event source: it delivers inbound frames and observes everything the
//! adapter emits.

use super::{ChannelError, ChannelFrame, Transport};
use async_trait::async_trait;
use tokio::sync::mpsc;

const INBOUND_CAPACITY: usize = 64;

pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<ChannelFrame>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: ChannelFrame) -> Result<(), ChannelError> {
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }
}

/// Source side of an in-process channel
pub struct MemoryServer {
    to_client: mpsc::Sender<ChannelFrame>,
    emitted: mpsc::UnboundedReceiver<ChannelFrame>,
}

impl MemoryServer {
    /// Push a frame to the adapter; silently dropped once the adapter is gone
    pub async fn deliver(&self, frame: ChannelFrame) {
        if self.to_client.send(frame).await.is_err() {
            tracing::debug!("memory channel: adapter side already closed");
        }
    }

    pub async fn next_emitted(&mut self) -> Option<ChannelFrame> {
        self.emitted.recv().await
    }

    pub fn try_next_emitted(&mut self) -> Option<ChannelFrame> {
        self.emitted.try_recv().ok()
    }
}

pub struct RemoteEnd {
    pub server: MemoryServer,
    /// Inbound stream to hand to `ChannelAdapter::from_transport`
    pub inbound: mpsc::Receiver<ChannelFrame>,
}

pub fn pair() -> (MemoryTransport, RemoteEnd) {
    let (to_client, inbound) = mpsc::channel(INBOUND_CAPACITY);
    let (outbound, emitted) = mpsc::unbounded_channel();

    (
        MemoryTransport { outbound },
        RemoteEnd {
            server: MemoryServer { to_client, emitted },
            inbound,
        },
    )
}
