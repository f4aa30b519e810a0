//! Connection supervisor
//!
//! Runs dispatch sessions back to back: connect, request the room join,
//! dispatch until the session ends. Failed sessions are retried with the
//! backoff of the connect policy. A stream end or a rejected join is final.

use crate::channel::websocket::ConnectOptions;
use crate::channel::{ChannelEmitter, ChannelError, JoinOptions};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::dispatcher::{connect_channel, LiveOverlayService, SessionEnd};
use crate::services::processor::DisplayProcessor;
use crate::state::OverlayState;
use resilience::{with_retry_if, ConnectPolicy, RetryError};
use std::sync::Arc;
use std::time::Duration;

/// Keep the overlay attached to its room until the stream ends.
///
/// Returns `Ok` on a stream end or a rejected join and an error once the
/// reconnect budget is spent or a failure cannot be retried.
pub async fn supervise(
    cfg: &Config,
    policy: &ConnectPolicy,
    overlay: &OverlayState,
) -> AppResult<()> {
    loop {
        let outcome = with_retry_if(
            policy.retry.clone(),
            || run_session(cfg, policy, overlay),
            AppError::is_retryable,
        )
        .await;

        match outcome {
            Ok(SessionEnd::StreamEnded) => {
                tracing::info!("stream ended, stopping");
                return Ok(());
            }
            Ok(SessionEnd::JoinFailed(reason)) => {
                tracing::warn!(reason = %reason, "room join failed, stopping");
                return Ok(());
            }
            Ok(SessionEnd::ChannelClosed { .. }) => {
                // The retry budget restarts after a session that had joined
                let delay = policy.retry.initial_backoff;
                tracing::warn!(delay = ?delay, "channel dropped after join, reconnecting");
                tokio::time::sleep(delay).await;
            }
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                let reason = format!("gave up after {attempts} attempts: {last_error}");
                tracing::error!(reason = %reason, "event source unavailable");
                overlay.update_session(|s| s.set_failed(reason.clone()));
                return Err(AppError::Connection(reason));
            }
            Err(RetryError::Aborted(e)) => {
                tracing::error!(error = %e, "unrecoverable channel failure");
                return Err(e);
            }
        }
    }
}

/// One connect, join and dispatch cycle.
///
/// A channel that closes before the join succeeded counts as a failed
/// attempt so the retry policy backs off.
async fn run_session(
    cfg: &Config,
    policy: &ConnectPolicy,
    overlay: &OverlayState,
) -> AppResult<SessionEnd> {
    let options = ConnectOptions {
        handshake_timeout: policy.handshake.duration,
    };
    let adapter = connect_channel(overlay, &cfg.server_url, &options).await?;

    let emitter = adapter.emitter();
    let processor = DisplayProcessor::new(
        overlay.clone(),
        Arc::new(emitter.clone()),
        cfg.timings.clone(),
    );
    let service = LiveOverlayService::new(overlay.clone(), processor);

    let join_task = tokio::spawn(request_join(
        emitter,
        cfg.room_id.clone(),
        JoinOptions {
            enable_extended_gift_info: cfg.enable_extended_gift_info,
        },
        cfg.join_delay,
    ));

    let end = service.run(adapter).await;
    join_task.abort();

    match end {
        SessionEnd::ChannelClosed { joined: false } => Err(AppError::Channel(ChannelError::Closed)),
        end => Ok(end),
    }
}

async fn request_join(
    emitter: ChannelEmitter,
    room_id: String,
    options: JoinOptions,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    if let Err(e) = emitter.join_room(&room_id, &options).await {
        tracing::warn!(error = %e, room = %room_id, "failed to send join request");
    }
}
