//! Console presentation surface
//!
//! Stands in for the scene renderer: it follows the overlay view and logs
//! what would be on screen whenever it changes.

use crate::models::DisplayEvent;
use crate::state::OverlayView;
use tokio::sync::watch;

/// Text lines a renderer would draw for `view`
pub fn render(view: &OverlayView) -> Vec<String> {
    let session = &view.session;
    let mut lines = vec![
        session.connection_status.to_string(),
        format!(
            "viewers: {} | likes: {} | diamonds: {}{}",
            session.viewer_count,
            session
                .total_like_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            session.cumulative_diamonds,
            session
                .waiting_list_size
                .map(|n| format!(" | waiting: {n}"))
                .unwrap_or_default(),
        ),
    ];

    if let Some(event) = &view.current {
        lines.push(render_event(event));
    }
    lines
}

fn render_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::Gift {
            sender_id,
            total_diamonds,
            icon_url,
            ..
        } => format!(
            "{sender_id}: {} ({total_diamonds} diamonds){}",
            event.caption(),
            icon_url
                .as_deref()
                .map(|url| format!(" [{url}]"))
                .unwrap_or_default()
        ),
        _ => format!("{}: {}", event.sender_id(), event.caption()),
    }
}

/// Log every overlay change until the state owner goes away
pub async fn run_console(mut rx: watch::Receiver<OverlayView>) {
    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        let lines = render(&view);
        match view.current {
            Some(ref event) => tracing::info!(
                status = %lines[0],
                stats = %lines[1],
                category = event.category().as_str(),
                "on screen: {}",
                lines[2]
            ),
            None => tracing::info!(status = %lines[0], stats = %lines[1], "slot empty"),
        }
    }
}
