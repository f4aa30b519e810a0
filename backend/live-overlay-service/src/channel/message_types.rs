use super::{ChannelError, ChannelFrame};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Message names on the overlay channel
pub mod names {
    // Outbound
    pub const SET_UNIQUE_ID: &str = "setUniqueId";
    pub const MESSAGE_PROCESSED: &str = "messageProcessed";

    // Inbound
    pub const SET_UNIQUE_ID_SUCCESS: &str = "setUniqueIdSuccess";
    pub const SET_UNIQUE_ID_FAILED: &str = "setUniqueIdFailed";
    pub const STREAM_END: &str = "streamEnd";
    pub const ROOM_USER: &str = "roomUser";
    pub const WAITING_LIST: &str = "waitingList";
    pub const LIKE: &str = "like";
    pub const TIKTOK_EVENT: &str = "tiktokEvent";
}

/// Opaque acknowledgment handle (`mqMsg`) echoed back verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckToken(Value);

impl AckToken {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Second argument of `setUniqueId`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOptions {
    pub enable_extended_gift_info: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            enable_extended_gift_info: true,
        }
    }
}

/// `setUniqueIdSuccess`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
}

/// `setUniqueIdFailed`: the source sends a bare reason string, newer
/// servers wrap it as `{reason}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JoinFailed {
    Reason(String),
    Wrapped { reason: String },
}

impl JoinFailed {
    pub fn into_reason(self) -> String {
        match self {
            JoinFailed::Reason(reason) | JoinFailed::Wrapped { reason } => reason,
        }
    }
}

/// `roomUser`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    #[serde(default)]
    pub viewer_count: Option<u64>,
}

/// `waitingList`: bare count or `{count}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WaitingList {
    Count(u64),
    Wrapped { count: u64 },
}

impl WaitingList {
    pub fn count(&self) -> u64 {
        match self {
            WaitingList::Count(count) | WaitingList::Wrapped { count } => *count,
        }
    }
}

/// `like` room statistics
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStats {
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub total_like_count: Option<u64>,
}

/// `tiktokEvent`: raw event data plus its acknowledgment token
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEvent {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub mq_msg: Option<AckToken>,
}

/// Decode the first argument of a frame into a typed payload
pub fn decode<T: DeserializeOwned>(frame: &ChannelFrame) -> Result<T, ChannelError> {
    T::deserialize(frame.first_arg())
        .map_err(|e| ChannelError::Codec(format!("{}: {}", frame.name, e)))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
