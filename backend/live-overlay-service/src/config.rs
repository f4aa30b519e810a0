use crate::error::AppError;
use crate::services::DisplayTimings;
use dotenvy::dotenv;
use resilience::{channel_connect_config, ConnectPolicy, TimeoutConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Socket.IO endpoint of the event relay
    pub server_url: String,
    /// Broadcaster whose room to join
    pub room_id: String,
    pub enable_extended_gift_info: bool,
    pub timings: DisplayTimings,
    pub connect_timeout: Duration,
    /// Delay between connecting and requesting the room join
    pub join_delay: Duration,
    pub connect_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("OVERLAY_SERVER_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:3001".to_string());
        let room_id = lookup("OVERLAY_ROOM_ID")
            .map(|s| s.trim().trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("OVERLAY_ROOM_ID missing".into()))?;

        let enable_extended_gift_info = match lookup("OVERLAY_EXTENDED_GIFT_INFO") {
            Some(v) => parse_bool("OVERLAY_EXTENDED_GIFT_INFO", &v)?,
            None => true,
        };

        let defaults = DisplayTimings::default();
        let timings = DisplayTimings {
            short: millis(&lookup, "OVERLAY_SHORT_DISPLAY_MS", defaults.short)?,
            long: millis(&lookup, "OVERLAY_LONG_DISPLAY_MS", defaults.long)?,
            ack_grace: millis(&lookup, "OVERLAY_ACK_GRACE_MS", defaults.ack_grace)?,
        };

        Ok(Self {
            server_url,
            room_id,
            enable_extended_gift_info,
            timings,
            connect_timeout: millis(
                &lookup,
                "OVERLAY_CONNECT_TIMEOUT_MS",
                channel_connect_config().handshake.duration,
            )?,
            join_delay: millis(&lookup, "OVERLAY_JOIN_DELAY_MS", Duration::from_secs(1))?,
            connect_max_retries: parse_or(&lookup, "OVERLAY_CONNECT_MAX_RETRIES", 3)?,
        })
    }

    /// Channel connect preset with the configured timeout and retry budget
    pub fn connect_policy(&self) -> ConnectPolicy {
        let mut policy = channel_connect_config();
        policy.handshake = TimeoutConfig {
            duration: self.connect_timeout,
        };
        policy.retry.max_retries = self.connect_max_retries;
        policy
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_millis() as u64).map(Duration::from_millis)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(AppError::Config(format!("{key}: not a boolean: {other}"))),
    }
}
