//! End-to-end flow over an in-memory channel: inbound frames in, overlay
//! state and `messageProcessed` acknowledgments out.

use live_overlay_service::channel::memory::{self, MemoryServer};
use live_overlay_service::channel::{names, ChannelAdapter, ChannelFrame};
use live_overlay_service::models::DisplayEvent;
use live_overlay_service::services::{
    DisplayProcessor, DisplayTimings, LiveOverlayService, ProcessorPhase, SessionEnd,
};
use live_overlay_service::session::ConnectionStatus;
use live_overlay_service::state::OverlayState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Harness {
    server: MemoryServer,
    overlay: OverlayState,
    processor: DisplayProcessor,
    run: JoinHandle<SessionEnd>,
}

impl Harness {
    fn start() -> Self {
        let (transport, remote) = memory::pair();
        let adapter = ChannelAdapter::from_transport(Arc::new(transport), remote.inbound);
        let overlay = OverlayState::new();
        let processor = DisplayProcessor::new(
            overlay.clone(),
            Arc::new(adapter.emitter()),
            DisplayTimings::default(),
        );
        let service = LiveOverlayService::new(overlay.clone(), processor.clone());
        let run = tokio::spawn(async move { service.run(adapter).await });

        Self {
            server: remote.server,
            overlay,
            processor,
            run,
        }
    }

    async fn send(&self, name: &str, arg: Value) {
        self.server.deliver(ChannelFrame::new(name, vec![arg])).await;
        settle().await;
    }

    async fn send_event(&self, data: Value, token: &str) {
        self.send(names::TIKTOK_EVENT, json!({"data": data, "mqMsg": {"id": token}}))
            .await;
    }

    /// Tokens of every `messageProcessed` emitted so far
    fn acks(&mut self) -> Vec<String> {
        let mut acks = Vec::new();
        while let Some(frame) = self.server.try_next_emitted() {
            assert_eq!(frame.name, names::MESSAGE_PROCESSED);
            acks.push(frame.args[0]["id"].as_str().unwrap_or_default().to_string());
        }
        acks
    }
}

/// Let the dispatch task drain delivered frames
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn gift_data(repeat_count: u32, gift_type: u32, repeat_end: u32, diamonds: u64) -> Value {
    json!({
        "type": "gift",
        "uniqueId": "maurice",
        "giftName": "Rose",
        "gift": {"repeat_count": repeat_count, "gift_type": gift_type, "repeat_end": repeat_end},
        "extendedGiftInfo": {"diamond_count": diamonds, "image": {"url_list": ["u1"]}}
    })
}

#[tokio::test(start_paused = true)]
async fn like_round_trip_displays_clears_then_acknowledges() {
    let mut h = Harness::start();

    h.send_event(json!({"type": "like", "likeCount": 10, "uniqueId": "maurice"}), "m1")
        .await;
    assert_eq!(
        h.overlay.current(),
        Some(DisplayEvent::Like {
            count: 10,
            sender_id: "maurice".into()
        })
    );

    advance_ms(300).await;
    assert_eq!(h.overlay.current(), None);
    assert!(h.acks().is_empty(), "ack must wait for the grace delay");

    advance_ms(500).await;
    assert_eq!(h.acks(), vec!["m1"]);
    assert_eq!(h.processor.phase(), ProcessorPhase::Idle);

    advance_ms(10_000).await;
    assert!(h.acks().is_empty(), "acknowledged more than once");
}

#[tokio::test(start_paused = true)]
async fn social_event_shows_verb_phrase() {
    let h = Harness::start();

    h.send_event(
        json!({"type": "social", "uniqueId": "maurice", "label": "{0:user} followed the host"}),
        "m1",
    )
    .await;

    assert_eq!(
        h.overlay.current(),
        Some(DisplayEvent::Social {
            sender_id: "maurice".into(),
            verb: "followed the host".into()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn pending_streak_is_not_displayed_but_acknowledged_once() {
    let mut h = Harness::start();
    let mut rx = h.overlay.subscribe();

    h.send_event(gift_data(3, 1, 0, 1), "streak").await;
    assert_eq!(h.overlay.current(), None);
    assert_eq!(h.overlay.session().cumulative_diamonds, 0);

    advance_ms(1_000).await;
    assert_eq!(h.acks(), vec!["streak"]);

    advance_ms(10_000).await;
    assert!(h.acks().is_empty());

    // Nothing ever reached the slot
    while rx.has_changed().unwrap_or(false) {
        assert_eq!(rx.borrow_and_update().current, None);
    }
}

#[tokio::test(start_paused = true)]
async fn gift_credits_diamonds_when_displayed() {
    let mut h = Harness::start();

    h.send_event(gift_data(5, 2, 0, 2), "g1").await;

    assert_eq!(
        h.overlay.current(),
        Some(DisplayEvent::Gift {
            sender_id: "maurice".into(),
            gift_name: "Rose".into(),
            repeat_count: 5,
            total_diamonds: 10,
            icon_url: Some("u1".into()),
        })
    );
    assert_eq!(h.overlay.session().cumulative_diamonds, 10);

    // Still on screen past the short duration
    advance_ms(3_000).await;
    assert!(h.overlay.current().is_some());
    assert!(h.acks().is_empty());

    advance_ms(1_100).await;
    assert_eq!(h.overlay.current(), None);
    advance_ms(500).await;
    assert_eq!(h.acks(), vec!["g1"]);

    // Terminal update of a streak adds on top, exactly once
    h.send_event(gift_data(4, 1, 1, 1), "g2").await;
    assert_eq!(h.overlay.session().cumulative_diamonds, 14);
    advance_ms(5_000).await;
    assert_eq!(h.acks(), vec!["g2"]);
    assert_eq!(h.overlay.session().cumulative_diamonds, 14);
}

#[tokio::test(start_paused = true)]
async fn second_event_without_ack_replaces_slot() {
    let mut h = Harness::start();

    h.send_event(gift_data(1, 2, 0, 5), "first").await;
    h.send_event(json!({"type": "like", "likeCount": 3, "uniqueId": "ada"}), "second")
        .await;

    assert_eq!(
        h.overlay.current(),
        Some(DisplayEvent::Like {
            count: 3,
            sender_id: "ada".into()
        })
    );
    assert_eq!(h.acks(), vec!["first"]);

    advance_ms(1_000).await;
    assert_eq!(h.overlay.current(), None);
    assert_eq!(h.acks(), vec!["second"]);

    // The replaced gift's timers were cancelled
    advance_ms(10_000).await;
    assert!(h.acks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stream_end_cancels_pending_acknowledgment() {
    let mut h = Harness::start();

    h.send_event(gift_data(1, 2, 0, 1), "g1").await;
    advance_ms(1_000).await;
    h.send(names::STREAM_END, json!({})).await;

    assert_eq!(h.overlay.current(), None);
    assert_eq!(
        h.overlay.session().connection_status,
        ConnectionStatus::StreamEnded
    );
    assert_eq!(h.processor.phase(), ProcessorPhase::Idle);

    advance_ms(10_000).await;
    assert!(h.acks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stream_end_after_clear_sends_nothing_more() {
    let mut h = Harness::start();

    h.send_event(json!({"type": "like", "likeCount": 1}), "l1").await;
    advance_ms(900).await;
    assert_eq!(h.acks(), vec!["l1"]);

    h.send(names::STREAM_END, json!({})).await;
    h.send(names::STREAM_END, json!({})).await;
    advance_ms(5_000).await;
    assert!(h.acks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stream_end_stops_dispatch_while_channel_stays_open() {
    let mut h = Harness::start();

    h.send(names::SET_UNIQUE_ID_SUCCESS, json!({"roomId": "r1"})).await;
    h.send(names::STREAM_END, json!({})).await;
    // Arrives after the end and must not be processed
    h.send_event(json!({"type": "like", "likeCount": 5}), "late").await;

    let end = tokio::time::timeout(Duration::from_secs(3600), &mut h.run)
        .await
        .expect("dispatch should finish on stream end")
        .unwrap();

    assert_eq!(end, SessionEnd::StreamEnded);
    assert_eq!(
        h.overlay.session().connection_status,
        ConnectionStatus::StreamEnded
    );
    assert_eq!(h.overlay.current(), None);
    advance_ms(5_000).await;
    assert!(h.acks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn join_failure_stops_dispatch() {
    let mut h = Harness::start();

    h.send(names::SET_UNIQUE_ID_FAILED, json!("nope")).await;

    let end = tokio::time::timeout(Duration::from_secs(3600), &mut h.run)
        .await
        .expect("dispatch should finish on join failure")
        .unwrap();

    assert_eq!(end, SessionEnd::JoinFailed("nope".into()));
    assert_eq!(
        h.overlay.session().connection_status,
        ConnectionStatus::Failed {
            reason: "nope".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn join_success_resets_counters() {
    let h = Harness::start();

    h.send(names::ROOM_USER, json!({"viewerCount": 58})).await;
    h.send(names::LIKE, json!({"likeCount": 4, "totalLikeCount": 73854}))
        .await;
    h.send_event(gift_data(1, 2, 0, 3), "g1").await;
    assert_eq!(h.overlay.session().viewer_count, 58);
    assert_eq!(h.overlay.session().total_like_count, Some(73854));
    assert_eq!(h.overlay.session().cumulative_diamonds, 3);

    h.send(names::SET_UNIQUE_ID_SUCCESS, json!({"roomId": "r1"})).await;

    let session = h.overlay.session();
    assert_eq!(
        session.connection_status,
        ConnectionStatus::Connected {
            room_id: "r1".into()
        }
    );
    assert_eq!(session.viewer_count, 0);
    assert_eq!(session.total_like_count, Some(0));
    assert_eq!(session.cumulative_diamonds, 0);
}

#[tokio::test(start_paused = true)]
async fn join_failure_is_surfaced_as_status() {
    let h = Harness::start();

    h.send(names::SET_UNIQUE_ID_FAILED, json!("LIVE has ended")).await;

    assert_eq!(
        h.overlay.session().connection_status,
        ConnectionStatus::Failed {
            reason: "LIVE has ended".into()
        }
    );
    assert_eq!(
        h.overlay.session().connection_status.to_string(),
        "LIVE has ended"
    );
}

#[tokio::test(start_paused = true)]
async fn room_statistics_update_session() {
    let h = Harness::start();

    h.send(names::ROOM_USER, json!({"viewerCount": 12})).await;
    h.send(names::ROOM_USER, json!({"topViewers": []})).await;
    h.send(names::WAITING_LIST, json!(2)).await;
    h.send_event(json!({"type": "like", "totalLikeCount": 900}), "l1")
        .await;

    let session = h.overlay.session();
    assert_eq!(session.viewer_count, 12);
    assert_eq!(session.waiting_list_size, Some(2));
    assert_eq!(session.total_like_count, Some(900));
    // A like without an increment updates the total but shows nothing
    assert_eq!(h.overlay.current(), None);
}

#[tokio::test(start_paused = true)]
async fn malformed_and_unhandled_envelopes_are_still_acknowledged() {
    let mut h = Harness::start();

    h.send_event(json!({"likeCount": 3}), "no-type").await;
    advance_ms(1_000).await;
    h.send_event(json!({"type": "chat", "comment": "hi"}), "chat").await;
    advance_ms(1_000).await;
    h.send(names::TIKTOK_EVENT, json!({"data": {"type": "like", "likeCount": 2}}))
        .await;
    advance_ms(1_000).await;

    assert_eq!(h.acks(), vec!["no-type", "chat"]);
    assert_eq!(h.overlay.current(), None);
}

#[tokio::test(start_paused = true)]
async fn channel_close_clears_slot_and_marks_disconnected() {
    let Harness {
        server,
        overlay,
        run,
        ..
    } = Harness::start();

    server.deliver(ChannelFrame::new(
        names::SET_UNIQUE_ID_SUCCESS,
        vec![json!({"roomId": "r1"})],
    ))
    .await;
    server.deliver(ChannelFrame::new(
        names::TIKTOK_EVENT,
        vec![json!({"data": gift_data(1, 2, 0, 1), "mqMsg": {"id": "g1"}})],
    ))
    .await;
    settle().await;
    assert!(overlay.current().is_some());

    drop(server);
    assert_eq!(run.await.unwrap(), SessionEnd::ChannelClosed { joined: true });

    assert_eq!(overlay.current(), None);
    assert_eq!(
        overlay.session().connection_status,
        ConnectionStatus::Disconnected
    );
}
