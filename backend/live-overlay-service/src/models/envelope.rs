//! Raw live events as delivered inside `tiktokEvent`

use crate::channel::AckToken;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// `gift_type` value of gifts that are sent as repeatable streaks
pub const STREAK_GIFT_TYPE: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Coarse event category used for routing and display timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Like,
    Social,
    Gift,
    Unhandled,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Like => "like",
            EventCategory::Social => "social",
            EventCategory::Gift => "gift",
            EventCategory::Unhandled => "unhandled",
        }
    }
}

/// Event payload, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveEvent {
    Like(LikeEvent),
    Social(SocialEvent),
    Gift(GiftEvent),
    #[serde(other)]
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeEvent {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub total_like_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialEvent {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftEvent {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub gift_id: Option<u64>,
    #[serde(default)]
    pub gift_name: Option<String>,
    #[serde(default)]
    pub gift: Option<GiftDetails>,
    #[serde(default)]
    pub extended_gift_info: Option<ExtendedGiftInfo>,
}

/// Streak bookkeeping of a gift message
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GiftDetails {
    #[serde(default)]
    pub gift_id: Option<u64>,
    #[serde(rename = "giftName", default)]
    pub gift_name: Option<String>,
    /// Absent or `null` counts as a single unit
    #[serde(default)]
    pub repeat_count: Option<u32>,
    #[serde(default)]
    pub gift_type: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    pub repeat_end: bool,
}

/// Catalogue data attached when the join requested extended gift info
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ExtendedGiftInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub diamond_count: Option<u64>,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub icon: Option<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub url_list: Option<Vec<String>>,
}

impl ImageRef {
    pub fn first_url(&self) -> Option<&str> {
        self.url_list
            .as_deref()?
            .first()
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}

/// `repeat_end` arrives as 0/1 from some relays and as a boolean from others
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected boolean flag, got {other}"
        ))),
    }
}

/// Normalized view of a gift used by streak and value rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftDescriptor {
    pub gift_id: Option<u64>,
    pub repeat_count: u32,
    pub is_streak_type: bool,
    pub streak_ended: bool,
    pub diamond_count_per_unit: u64,
    pub image_url: Option<String>,
}

impl GiftDescriptor {
    /// A streak still accumulating; only its terminal update counts
    pub fn is_pending_streak(&self) -> bool {
        self.is_streak_type && !self.streak_ended
    }

    pub fn total_diamonds(&self) -> u64 {
        self.diamond_count_per_unit
            .saturating_mul(u64::from(self.repeat_count))
    }
}

impl GiftEvent {
    /// `None` when the streak block is missing entirely
    pub fn descriptor(&self) -> Option<GiftDescriptor> {
        let gift = self.gift.as_ref()?;
        let extended = self.extended_gift_info.as_ref();

        Some(GiftDescriptor {
            gift_id: gift.gift_id.or(self.gift_id),
            repeat_count: gift.repeat_count.unwrap_or(1).max(1),
            is_streak_type: gift.gift_type == Some(STREAK_GIFT_TYPE),
            streak_ended: gift.repeat_end,
            diamond_count_per_unit: extended
                .and_then(|info| info.diamond_count)
                .unwrap_or(0),
            image_url: extended.and_then(|info| {
                info.image
                    .as_ref()
                    .and_then(ImageRef::first_url)
                    .or_else(|| info.icon.as_ref().and_then(ImageRef::first_url))
                    .map(str::to_string)
            }),
        })
    }

    /// Name from the streak block, then the top level, then the catalogue
    pub fn display_name(&self) -> Option<&str> {
        self.gift
            .as_ref()
            .and_then(|gift| gift.gift_name.as_deref())
            .or(self.gift_name.as_deref())
            .or_else(|| {
                self.extended_gift_info
                    .as_ref()
                    .and_then(|info| info.name.as_deref())
            })
            .filter(|name| !name.is_empty())
    }
}

/// One inbound live event plus the token that releases the next one
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: LiveEvent,
    pub token: AckToken,
}

impl LiveEvent {
    /// Validate raw event data at the classifier boundary
    pub fn parse(data: &Value) -> Result<Self, EnvelopeError> {
        if data.get("type").and_then(Value::as_str).is_none() {
            return Err(EnvelopeError::Malformed(
                "missing string discriminator `type`".into(),
            ));
        }
        LiveEvent::deserialize(data).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }

    pub fn category(&self) -> EventCategory {
        match self {
            LiveEvent::Like(_) => EventCategory::Like,
            LiveEvent::Social(_) => EventCategory::Social,
            LiveEvent::Gift(_) => EventCategory::Gift,
            LiveEvent::Unhandled => EventCategory::Unhandled,
        }
    }

    /// Cumulative room like counter carried by like events
    pub fn total_like_count(&self) -> Option<u64> {
        match self {
            LiveEvent::Like(like) => like.total_like_count,
            _ => None,
        }
    }
}
