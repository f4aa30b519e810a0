use super::envelope::EventCategory;
use serde::Serialize;

/// What the presentation surface shows in the single slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayEvent {
    Like {
        count: u64,
        sender_id: String,
    },
    Social {
        sender_id: String,
        verb: String,
    },
    Gift {
        sender_id: String,
        gift_name: String,
        repeat_count: u32,
        total_diamonds: u64,
        icon_url: Option<String>,
    },
}

impl DisplayEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            DisplayEvent::Like { .. } => EventCategory::Like,
            DisplayEvent::Social { .. } => EventCategory::Social,
            DisplayEvent::Gift { .. } => EventCategory::Gift,
        }
    }

    pub fn sender_id(&self) -> &str {
        match self {
            DisplayEvent::Like { sender_id, .. }
            | DisplayEvent::Social { sender_id, .. }
            | DisplayEvent::Gift { sender_id, .. } => sender_id,
        }
    }

    /// Diamonds credited to the session when this event goes on screen
    pub fn diamonds(&self) -> u64 {
        match self {
            DisplayEvent::Gift { total_diamonds, .. } => *total_diamonds,
            _ => 0,
        }
    }

    /// Text line rendered under the sender's name
    pub fn caption(&self) -> String {
        match self {
            DisplayEvent::Like { count, .. } => format!("sent likes x {count}"),
            DisplayEvent::Social { verb, .. } => verb.clone(),
            DisplayEvent::Gift {
                gift_name,
                repeat_count,
                ..
            } => format!("{gift_name} x{repeat_count}"),
        }
    }
}
