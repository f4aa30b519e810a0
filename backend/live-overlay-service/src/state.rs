use crate::models::DisplayEvent;
use crate::session::SessionState;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the presentation surface renders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OverlayView {
    pub session: SessionState,
    /// The single display slot; empty between events
    pub current: Option<DisplayEvent>,
}

/// Shared overlay state.
///
/// Session counters and the display slot sit in one watch value, so each
/// update is applied under a single lock and the surface always observes a
/// consistent snapshot.
#[derive(Clone)]
pub struct OverlayState {
    tx: Arc<watch::Sender<OverlayView>>,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(OverlayView::default());
        Self { tx: Arc::new(tx) }
    }

    /// Read-only view for the presentation surface
    pub fn subscribe(&self) -> watch::Receiver<OverlayView> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> OverlayView {
        self.tx.borrow().clone()
    }

    pub fn session(&self) -> SessionState {
        self.tx.borrow().session.clone()
    }

    pub fn current(&self) -> Option<DisplayEvent> {
        self.tx.borrow().current.clone()
    }

    pub fn update_session<F>(&self, update: F)
    where
        F: FnOnce(&mut SessionState),
    {
        self.tx.send_modify(|view| update(&mut view.session));
    }

    /// Put `event` in the slot and credit its diamonds in the same update
    pub(crate) fn present(&self, event: DisplayEvent) {
        self.tx.send_modify(|view| {
            view.session.add_diamonds(event.diamonds());
            view.current = Some(event);
        });
    }

    /// Empty the slot; returns whether anything was on screen
    pub(crate) fn clear_slot(&self) -> bool {
        self.tx.send_if_modified(|view| view.current.take().is_some())
    }
}
