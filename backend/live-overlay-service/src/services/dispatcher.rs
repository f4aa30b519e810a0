//! Routes inbound channel messages to session state, classifier and processor

use crate::channel::message_types::{
    decode, JoinFailed, LikeStats, QueuedEvent, RoomJoined, RoomUser, WaitingList,
};
use crate::channel::websocket::ConnectOptions;
use crate::channel::{names, AckToken, ChannelAdapter, ChannelFrame};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{Envelope, LiveEvent};
use crate::services::classifier::EventClassifier;
use crate::services::processor::DisplayProcessor;
use crate::session::ConnectionStatus;
use crate::state::OverlayState;
use std::sync::Arc;
use tokio::sync::Notify;

/// Open one connection to the event source.
///
/// Status goes to `Connecting` first; a failed attempt is recorded as
/// `Failed(reason)` and returned so the caller's policy can decide on a retry.
pub async fn connect_channel(
    overlay: &OverlayState,
    endpoint: &str,
    options: &ConnectOptions,
) -> AppResult<ChannelAdapter> {
    overlay.update_session(|s| s.set_connecting());

    ChannelAdapter::connect(endpoint, options)
        .await
        .map_err(|e| {
            tracing::warn!(endpoint, error = %e, "could not connect to event source");
            overlay.update_session(|s| s.set_failed(e.to_string()));
            AppError::from(e)
        })
}

/// Why a dispatch session finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    StreamEnded,
    JoinFailed(String),
    /// Transport closed; `joined` tells whether the room join had succeeded
    ChannelClosed { joined: bool },
}

#[derive(Clone)]
pub struct LiveOverlayService {
    overlay: OverlayState,
    processor: DisplayProcessor,
    classifier: Arc<EventClassifier>,
    /// Fired by terminal room messages; ends dispatch
    stop: Arc<Notify>,
}

impl LiveOverlayService {
    pub fn new(overlay: OverlayState, processor: DisplayProcessor) -> Self {
        Self {
            overlay,
            processor,
            classifier: Arc::new(EventClassifier::new()),
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn processor(&self) -> &DisplayProcessor {
        &self.processor
    }

    /// Register one handler per inbound message name
    pub fn attach(&self, adapter: &mut ChannelAdapter) {
        let service = self.clone();
        adapter.on_message(names::SET_UNIQUE_ID_SUCCESS, move |frame| {
            service.on_room_joined(frame)
        });

        let service = self.clone();
        adapter.on_message(names::SET_UNIQUE_ID_FAILED, move |frame| {
            service.on_join_failed(frame)
        });

        let service = self.clone();
        adapter.on_message(names::STREAM_END, move |_| service.on_stream_end());

        let service = self.clone();
        adapter.on_message(names::ROOM_USER, move |frame| service.on_room_user(frame));

        let service = self.clone();
        adapter.on_message(names::WAITING_LIST, move |frame| {
            service.on_waiting_list(frame)
        });

        let service = self.clone();
        adapter.on_message(names::LIKE, move |frame| service.on_like_stats(frame));

        let service = self.clone();
        adapter.on_message(names::TIKTOK_EVENT, move |frame| {
            service.on_live_event(frame)
        });
    }

    /// Dispatch until the channel closes or the room reaches a terminal
    /// state, then tear the slot down
    pub async fn run(&self, mut adapter: ChannelAdapter) -> SessionEnd {
        self.attach(&mut adapter);
        let stop = self.stop.clone();
        adapter.run_until(async move { stop.notified().await }).await;

        let session = self.overlay.session();
        let end = match session.connection_status {
            ConnectionStatus::StreamEnded => SessionEnd::StreamEnded,
            ConnectionStatus::Failed { ref reason } => SessionEnd::JoinFailed(reason.clone()),
            _ => SessionEnd::ChannelClosed {
                joined: session.is_connected(),
            },
        };
        self.on_channel_closed();
        end
    }

    fn on_room_joined(&self, frame: ChannelFrame) {
        match decode::<RoomJoined>(&frame) {
            Ok(joined) => {
                tracing::info!(room_id = %joined.room_id, "connected to room");
                self.overlay
                    .update_session(|s| s.set_connected(joined.room_id));
            }
            Err(e) => tracing::warn!(error = %e, "ignoring malformed join confirmation"),
        }
    }

    fn on_join_failed(&self, frame: ChannelFrame) {
        let reason = decode::<JoinFailed>(&frame)
            .map(JoinFailed::into_reason)
            .unwrap_or_else(|_| frame.first_arg().to_string());
        tracing::warn!(reason = %reason, "room join rejected");
        self.overlay.update_session(|s| s.set_failed(reason));
        self.stop.notify_one();
    }

    fn on_stream_end(&self) {
        tracing::info!("stream ended");
        self.processor.shutdown();
        self.overlay.update_session(|s| s.set_stream_ended());
        self.stop.notify_one();
    }

    fn on_room_user(&self, frame: ChannelFrame) {
        match decode::<RoomUser>(&frame) {
            Ok(RoomUser {
                viewer_count: Some(count),
            }) => self.overlay.update_session(|s| s.set_viewer_count(count)),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "ignoring roomUser update"),
        }
    }

    fn on_waiting_list(&self, frame: ChannelFrame) {
        match decode::<WaitingList>(&frame) {
            Ok(list) => {
                let count = list.count();
                self.overlay
                    .update_session(|s| s.set_waiting_list_size(count));
            }
            Err(e) => tracing::debug!(error = %e, "ignoring waitingList update"),
        }
    }

    fn on_like_stats(&self, frame: ChannelFrame) {
        match decode::<LikeStats>(&frame) {
            Ok(LikeStats {
                total_like_count: Some(total),
                ..
            }) => self.overlay.update_session(|s| s.set_total_like_count(total)),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "ignoring like statistics"),
        }
    }

    fn on_live_event(&self, frame: ChannelFrame) {
        match decode::<QueuedEvent>(&frame) {
            Ok(queued) => self.handle_queued_event(queued),
            Err(e) => {
                tracing::warn!(error = %e, "malformed tiktokEvent frame");
                let token = frame
                    .first_arg()
                    .get("mqMsg")
                    .filter(|v| !v.is_null())
                    .cloned()
                    .map(AckToken::new);
                self.drop_malformed(token);
            }
        }
    }

    /// Classify one queued event and hand it to the processor.
    ///
    /// Every envelope that carries a token is acknowledged exactly once,
    /// whether or not it is displayed; the source waits for that signal.
    pub fn handle_queued_event(&self, queued: QueuedEvent) {
        let QueuedEvent { data, mq_msg } = queued;

        let event = match LiveEvent::parse(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed envelope");
                self.drop_malformed(mq_msg);
                return;
            }
        };

        if let Some(total) = event.total_like_count() {
            self.overlay
                .update_session(|s| s.set_total_like_count(total));
        }

        let Some(token) = mq_msg else {
            tracing::warn!(
                category = event.category().as_str(),
                "event without mqMsg cannot be acknowledged, ignoring"
            );
            metrics::record_dropped("missing_token");
            return;
        };
        let envelope = Envelope { event, token };
        let category = envelope.event.category();
        metrics::record_received(category.as_str());

        match self.classifier.classify_detailed(&envelope.event) {
            Ok(display) => self.processor.submit(display, envelope.token),
            Err(reason) => {
                tracing::debug!(
                    category = category.as_str(),
                    reason = reason.as_str(),
                    "event not displayed"
                );
                metrics::record_dropped(reason.as_str());
                self.processor.submit_dropped(envelope.token);
            }
        }
    }

    fn drop_malformed(&self, token: Option<AckToken>) {
        metrics::record_received("malformed");
        metrics::record_dropped("malformed");
        match token {
            Some(token) => self.processor.submit_dropped(token),
            None => tracing::warn!("malformed envelope carried no mqMsg, nothing to acknowledge"),
        }
    }

    fn on_channel_closed(&self) {
        if self.processor.shutdown() {
            tracing::info!("cancelled in-flight display on channel close");
        }
        self.overlay.update_session(|s| {
            if !matches!(
                s.connection_status,
                ConnectionStatus::StreamEnded | ConnectionStatus::Failed { .. }
            ) {
                s.set_disconnected();
            }
        });
    }
}
