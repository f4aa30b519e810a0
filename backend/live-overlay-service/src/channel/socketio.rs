//! Engine.IO v4 / Socket.IO v5 text packet codec
//!
//! Only the text subset is supported; binary attachments are rejected.
//!
//! ```text
//! 0{"sid":..,"pingInterval":..}   open
//! 2 / 3                           ping / pong
//! 40                              connect default namespace
//! 42["tiktokEvent",{..}]          event
//! 42/admin,17["name",..]          event on a namespace with an ack id
//! 44{"message":".."}              connect error
//! ```

use super::{ChannelError, ChannelFrame};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_NAMESPACE: &str = "/";

/// Handshake sent by the server in the `open` packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        payload: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        payload: Value,
    },
}

impl SocketPacket {
    /// Event on the default namespace without an ack id
    pub fn event(frame: ChannelFrame) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            name: frame.name,
            args: frame.args,
        }
    }

    pub fn connect_default() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            payload: None,
        }
    }
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(packet) => format!("4{}", encode_socket_packet(packet)),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

fn encode_socket_packet(packet: &SocketPacket) -> String {
    match packet {
        SocketPacket::Connect { namespace, payload } => {
            let body = payload.as_ref().map(Value::to_string).unwrap_or_default();
            format!("0{}{}", namespace_prefix(namespace), body)
        }
        SocketPacket::Disconnect { namespace } => format!("1{}", namespace_prefix(namespace)),
        SocketPacket::Event {
            namespace,
            ack_id,
            name,
            args,
        } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            format!(
                "2{}{}{}",
                namespace_prefix(namespace),
                ack_id.map(|id| id.to_string()).unwrap_or_default(),
                Value::Array(items)
            )
        }
        SocketPacket::Ack {
            namespace,
            ack_id,
            args,
        } => format!(
            "3{}{}{}",
            namespace_prefix(namespace),
            ack_id,
            Value::Array(args.clone())
        ),
        SocketPacket::ConnectError { namespace, payload } => {
            format!("4{}{}", namespace_prefix(namespace), payload)
        }
    }
}

/// Decode one WebSocket text message into an Engine.IO packet
pub fn decode(text: &str) -> Result<EnginePacket, ChannelError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChannelError::Codec("empty packet".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| ChannelError::Codec(format!("open handshake: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket_packet(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(ChannelError::Codec(format!(
            "unknown engine packet type {other:?}"
        ))),
    }
}

fn decode_socket_packet(text: &str) -> Result<SocketPacket, ChannelError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChannelError::Codec("empty socket packet".into()))?;
    let (namespace, rest) = split_namespace(chars.as_str());
    let (ack_id, body) = split_ack_id(rest)?;

    match kind {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            payload: parse_optional_json(body)?,
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut items = parse_array(body)?;
            if items.is_empty() {
                return Err(ChannelError::Codec("event without a name".into()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(ChannelError::Codec(format!(
                        "event name must be a string, got {other}"
                    )))
                }
            };
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args: items,
            })
        }
        '3' => Ok(SocketPacket::Ack {
            namespace,
            ack_id: ack_id.ok_or_else(|| ChannelError::Codec("ack without an id".into()))?,
            args: parse_array(body)?,
        }),
        '4' => Ok(SocketPacket::ConnectError {
            namespace,
            payload: parse_optional_json(body)?.unwrap_or(Value::Null),
        }),
        '5' | '6' => Err(ChannelError::Codec(
            "binary socket packets are not supported".into(),
        )),
        other => Err(ChannelError::Codec(format!(
            "unknown socket packet type {other:?}"
        ))),
    }
}

fn split_namespace(text: &str) -> (String, &str) {
    if !text.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), text);
    }
    match text.find(',') {
        Some(idx) => (text[..idx].to_string(), &text[idx + 1..]),
        None => (text.to_string(), ""),
    }
}

fn split_ack_id(text: &str) -> Result<(Option<u64>, &str), ChannelError> {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, text));
    }
    let id = text[..digits]
        .parse()
        .map_err(|e| ChannelError::Codec(format!("ack id: {e}")))?;
    Ok((Some(id), &text[digits..]))
}

fn parse_optional_json(body: &str) -> Result<Option<Value>, ChannelError> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| ChannelError::Codec(format!("payload: {e}")))
}

fn parse_array(body: &str) -> Result<Vec<Value>, ChannelError> {
    match parse_optional_json(body)? {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ChannelError::Codec(format!("expected array, got {other}"))),
        None => Ok(Vec::new()),
    }
}
