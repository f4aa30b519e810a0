//! Per-connection counters and connection status

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        room_id: String,
    },
    Failed {
        reason: String,
    },
    StreamEnded,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connecting => f.write_str("Connecting..."),
            ConnectionStatus::Connected { room_id } => write!(f, "Connected to roomId {room_id}"),
            ConnectionStatus::Failed { reason } => f.write_str(reason),
            ConnectionStatus::StreamEnded => f.write_str("Stream ended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionState {
    pub connection_status: ConnectionStatus,
    pub viewer_count: u64,
    /// `None` until the first cumulative count arrives
    pub total_like_count: Option<u64>,
    pub cumulative_diamonds: u64,
    pub waiting_list_size: Option<u64>,
}

impl SessionState {
    pub fn set_connecting(&mut self) {
        self.connection_status = ConnectionStatus::Connecting;
    }

    /// Room joined; counters restart for the new room
    pub fn set_connected(&mut self, room_id: impl Into<String>) {
        *self = SessionState {
            connection_status: ConnectionStatus::Connected {
                room_id: room_id.into(),
            },
            viewer_count: 0,
            total_like_count: Some(0),
            cumulative_diamonds: 0,
            waiting_list_size: self.waiting_list_size,
        };
    }

    pub fn set_failed(&mut self, reason: impl Into<String>) {
        self.connection_status = ConnectionStatus::Failed {
            reason: reason.into(),
        };
    }

    pub fn set_stream_ended(&mut self) {
        self.connection_status = ConnectionStatus::StreamEnded;
    }

    pub fn set_disconnected(&mut self) {
        self.connection_status = ConnectionStatus::Disconnected;
    }

    pub fn set_viewer_count(&mut self, n: u64) {
        self.viewer_count = n;
    }

    pub fn set_total_like_count(&mut self, n: u64) {
        self.total_like_count = Some(n);
    }

    pub fn add_diamonds(&mut self, n: u64) {
        self.cumulative_diamonds = self.cumulative_diamonds.saturating_add(n);
    }

    pub fn set_waiting_list_size(&mut self, n: u64) {
        self.waiting_list_size = Some(n);
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection_status, ConnectionStatus::Connected { .. })
    }
}
