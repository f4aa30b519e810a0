//! Event classification and enrichment
//!
//! Turns a validated `LiveEvent` into at most one `DisplayEvent`. The
//! classifier is pure: counters are credited by the display processor when
//! the event actually goes on screen.

use crate::models::envelope::{GiftEvent, LikeEvent, SocialEvent};
use crate::models::{DisplayEvent, LiveEvent};

/// Placeholder the source embeds in social labels for the sender's name
pub const USER_PLACEHOLDER: &str = "{0:user}";

/// Why an event produced nothing to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Like event without an increment
    NoLikeIncrement,
    /// Social event without a label
    NoLabel,
    /// Intermediate update of a gift streak
    PendingStreak,
    /// Gift without extended info, or worth zero diamonds
    NoGiftValue,
    Unhandled,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoLikeIncrement => "no_like_increment",
            DropReason::NoLabel => "no_label",
            DropReason::PendingStreak => "pending_streak",
            DropReason::NoGiftValue => "no_gift_value",
            DropReason::Unhandled => "unhandled",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventClassifier;

impl EventClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, event: &LiveEvent) -> Option<DisplayEvent> {
        self.classify_detailed(event).ok()
    }

    /// Like `classify`, but reports why an event was dropped
    pub fn classify_detailed(&self, event: &LiveEvent) -> Result<DisplayEvent, DropReason> {
        match event {
            LiveEvent::Like(like) => classify_like(like),
            LiveEvent::Social(social) => classify_social(social),
            LiveEvent::Gift(gift) => classify_gift(gift),
            LiveEvent::Unhandled => Err(DropReason::Unhandled),
        }
    }
}

fn sender(unique_id: &Option<String>) -> String {
    unique_id.clone().unwrap_or_default()
}

fn classify_like(like: &LikeEvent) -> Result<DisplayEvent, DropReason> {
    match like.like_count {
        Some(count) if count > 0 => Ok(DisplayEvent::Like {
            count,
            sender_id: sender(&like.unique_id),
        }),
        _ => Err(DropReason::NoLikeIncrement),
    }
}

fn classify_social(social: &SocialEvent) -> Result<DisplayEvent, DropReason> {
    let label = social.label.as_deref().ok_or(DropReason::NoLabel)?;
    Ok(DisplayEvent::Social {
        sender_id: sender(&social.unique_id),
        verb: label.replacen(USER_PLACEHOLDER, "", 1).trim().to_string(),
    })
}

fn classify_gift(gift: &GiftEvent) -> Result<DisplayEvent, DropReason> {
    let descriptor = gift.descriptor().ok_or(DropReason::NoGiftValue)?;

    if descriptor.is_pending_streak() {
        return Err(DropReason::PendingStreak);
    }
    if gift.extended_gift_info.is_none() || descriptor.diamond_count_per_unit == 0 {
        return Err(DropReason::NoGiftValue);
    }

    Ok(DisplayEvent::Gift {
        sender_id: sender(&gift.unique_id),
        gift_name: gift.display_name().unwrap_or_default().to_string(),
        repeat_count: descriptor.repeat_count,
        total_diamonds: descriptor.total_diamonds(),
        icon_url: descriptor.image_url,
    })
}
