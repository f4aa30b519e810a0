//! Single-slot display processor
//!
//! Each accepted envelope runs through
//! `Idle -> Displaying -> Clearing -> Acknowledging -> Idle`:
//! the event stays in the slot for a category-dependent duration, the slot is
//! emptied, and after a grace delay the envelope's token is sent back so the
//! source releases the next event. Envelopes with nothing to display start at
//! `Clearing`.
//!
//! The whole lifecycle of one envelope is a single spawned task. A newer
//! envelope or a teardown aborts it and bumps the generation, so a stale task
//! that already passed an await point can never touch the slot again.

use crate::channel::{AckToken, Acknowledger};
use crate::metrics;
use crate::models::{DisplayEvent, EventCategory};
use crate::state::OverlayState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTimings {
    /// Likes and social events
    pub short: Duration,
    /// Gifts
    pub long: Duration,
    /// Gap between clearing the slot and acknowledging
    pub ack_grace: Duration,
}

impl Default for DisplayTimings {
    fn default() -> Self {
        Self {
            short: Duration::from_millis(200),
            long: Duration::from_millis(4000),
            ack_grace: Duration::from_millis(500),
        }
    }
}

impl DisplayTimings {
    pub fn duration_for(&self, category: EventCategory) -> Duration {
        match category {
            EventCategory::Gift => self.long,
            EventCategory::Like | EventCategory::Social | EventCategory::Unhandled => self.short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorPhase {
    Idle,
    Displaying,
    Clearing,
    Acknowledging,
}

struct Control {
    phase: ProcessorPhase,
    generation: u64,
    token: Option<AckToken>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    control: Mutex<Control>,
    overlay: OverlayState,
    acker: Arc<dyn Acknowledger>,
    timings: DisplayTimings,
}

#[derive(Clone)]
pub struct DisplayProcessor {
    inner: Arc<Inner>,
}

impl DisplayProcessor {
    pub fn new(
        overlay: OverlayState,
        acker: Arc<dyn Acknowledger>,
        timings: DisplayTimings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                control: Mutex::new(Control {
                    phase: ProcessorPhase::Idle,
                    generation: 0,
                    token: None,
                    task: None,
                }),
                overlay,
                acker,
                timings,
            }),
        }
    }

    pub fn phase(&self) -> ProcessorPhase {
        self.inner.control.lock().phase
    }

    pub fn timings(&self) -> &DisplayTimings {
        &self.inner.timings
    }

    /// Put `event` on screen and schedule its clear and acknowledgment.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, event: DisplayEvent, token: AckToken) {
        let display_for = self.inner.timings.duration_for(event.category());
        self.start(Some((event, display_for)), token);
    }

    /// Acknowledge an envelope that produced nothing to display
    pub fn submit_dropped(&self, token: AckToken) {
        self.start(None, token);
    }

    /// Cancel pending timers, empty the slot and discard the pending token.
    ///
    /// Returns whether an envelope was in flight.
    pub fn shutdown(&self) -> bool {
        let mut control = self.inner.control.lock();
        let was_active = control.phase != ProcessorPhase::Idle;

        control.generation += 1;
        if let Some(task) = control.task.take() {
            task.abort();
        }
        if let Some(token) = control.token.take() {
            tracing::debug!(token = %token.as_value(), "discarding unacknowledged token");
        }
        control.phase = ProcessorPhase::Idle;
        self.inner.overlay.clear_slot();

        was_active
    }

    fn start(&self, display: Option<(DisplayEvent, Duration)>, token: AckToken) {
        let superseded = {
            let mut control = self.inner.control.lock();

            if let Some(task) = control.task.take() {
                task.abort();
            }
            let superseded = control.token.take();
            if control.phase != ProcessorPhase::Idle {
                tracing::warn!(
                    phase = ?control.phase,
                    "event arrived before previous acknowledgment, replacing slot"
                );
            }

            control.generation += 1;
            let generation = control.generation;
            control.token = Some(token);

            let display_for = match display {
                Some((event, display_for)) => {
                    tracing::info!(
                        category = event.category().as_str(),
                        sender = event.sender_id(),
                        caption = %event.caption(),
                        "displaying event"
                    );
                    control.phase = ProcessorPhase::Displaying;
                    self.inner.overlay.present(event);
                    Some(display_for)
                }
                None => {
                    control.phase = ProcessorPhase::Clearing;
                    self.inner.overlay.clear_slot();
                    None
                }
            };

            control.task = Some(tokio::spawn(
                self.clone().run_lifecycle(generation, display_for),
            ));
            superseded
        };

        // The superseded event has already left the slot
        if let Some(token) = superseded {
            let acker = self.inner.acker.clone();
            tokio::spawn(async move {
                send_ack(acker.as_ref(), token, "superseded").await;
            });
        }
    }

    async fn run_lifecycle(self, generation: u64, display_for: Option<Duration>) {
        if let Some(display_for) = display_for {
            tokio::time::sleep(display_for).await;
            if !self.enter_clearing(generation) {
                return;
            }
        }

        tokio::time::sleep(self.inner.timings.ack_grace).await;
        let Some(token) = self.enter_acknowledging(generation) else {
            return;
        };

        send_ack(self.inner.acker.as_ref(), token, "sent").await;
        self.finish(generation);
    }

    fn enter_clearing(&self, generation: u64) -> bool {
        let mut control = self.inner.control.lock();
        if control.generation != generation {
            return false;
        }
        control.phase = ProcessorPhase::Clearing;
        self.inner.overlay.clear_slot();
        true
    }

    fn enter_acknowledging(&self, generation: u64) -> Option<AckToken> {
        let mut control = self.inner.control.lock();
        if control.generation != generation {
            return None;
        }
        control.phase = ProcessorPhase::Acknowledging;
        control.token.take()
    }

    fn finish(&self, generation: u64) {
        let mut control = self.inner.control.lock();
        if control.generation == generation {
            control.phase = ProcessorPhase::Idle;
            control.task = None;
        }
    }
}

/// Failures are logged, never propagated
async fn send_ack(acker: &dyn Acknowledger, token: AckToken, outcome: &'static str) {
    match acker.acknowledge(token).await {
        Ok(()) => {
            tracing::debug!(outcome, "acknowledged envelope");
            metrics::record_ack(outcome);
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to acknowledge envelope");
            metrics::record_ack("failed");
        }
    }
}
