//! Supervisor lifecycle against a local Socket.IO relay

use futures_util::{SinkExt, StreamExt};
use live_overlay_service::config::Config;
use live_overlay_service::error::AppError;
use live_overlay_service::services::supervise;
use live_overlay_service::session::ConnectionStatus;
use live_overlay_service::state::OverlayState;
use resilience::{channel_connect_config, ConnectPolicy, RetryConfig};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

type ServerSocket = WebSocketStream<TcpStream>;

const OPEN: &str =
    r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

/// Accept connections forever; `script` gets each socket and its index
async fn serve<F, Fut>(script: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(ServerSocket, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let Ok(ws) = accept_async(stream).await else {
                continue;
            };
            tokio::spawn(script(ws, index));
        }
    });
    (format!("http://{addr}"), connections)
}

async fn next_text(ws: &mut ServerSocket) -> Option<String> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return Some(text),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

async fn send_text(ws: &mut ServerSocket, text: &str) {
    let _ = ws.send(Message::Text(text.to_string())).await;
}

async fn accept_namespace(ws: &mut ServerSocket) {
    send_text(ws, OPEN).await;
    assert_eq!(next_text(ws).await.as_deref(), Some("40"));
    send_text(ws, r#"40{"sid":"ns-1"}"#).await;
}

/// Wait for the join request and answer it
async fn confirm_join(ws: &mut ServerSocket) {
    let join = next_text(ws).await.unwrap();
    assert!(join.starts_with(r#"42["setUniqueId","r1""#), "{join}");
    send_text(ws, r#"42["setUniqueIdSuccess",{"roomId":"7091"}]"#).await;
}

async fn drain(mut ws: ServerSocket) {
    while ws.next().await.is_some() {}
}

fn config(endpoint: &str) -> Config {
    Config::from_lookup(|key| match key {
        "OVERLAY_SERVER_URL" => Some(endpoint.to_string()),
        "OVERLAY_ROOM_ID" => Some("r1".to_string()),
        "OVERLAY_JOIN_DELAY_MS" => Some("0".to_string()),
        _ => None,
    })
    .unwrap()
}

fn fast_policy(max_retries: u32) -> ConnectPolicy {
    let mut policy = channel_connect_config();
    policy.handshake.duration = Duration::from_secs(5);
    policy.retry = RetryConfig {
        max_retries,
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_secs(1),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    policy
}

#[tokio::test]
async fn unreachable_relay_gives_up_after_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let overlay = OverlayState::new();

    let result = timeout(
        Duration::from_secs(10),
        supervise(&config(&endpoint), &fast_policy(2), &overlay),
    )
    .await
    .unwrap();

    match result {
        Err(AppError::Connection(reason)) => assert!(reason.contains("3 attempts"), "{reason}"),
        other => panic!("expected exhausted budget, got {other:?}"),
    }
    assert!(matches!(
        overlay.session().connection_status,
        ConnectionStatus::Failed { .. }
    ));
}

#[tokio::test]
async fn reconnects_back_off_when_relay_hangs_up_before_join() {
    let (endpoint, connections) = serve(|mut ws, _| async move {
        accept_namespace(&mut ws).await;
        send_text(&mut ws, "41").await;
    })
    .await;
    let overlay = OverlayState::new();

    let started = Instant::now();
    let result = timeout(
        Duration::from_secs(10),
        supervise(&config(&endpoint), &fast_policy(2), &overlay),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(AppError::Connection(_))), "{result:?}");
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    // 50ms then 100ms between the three attempts
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn stream_end_stops_supervisor_with_socket_open() {
    let (endpoint, connections) = serve(|mut ws, _| async move {
        accept_namespace(&mut ws).await;
        confirm_join(&mut ws).await;
        send_text(&mut ws, r#"42["streamEnd",{}]"#).await;
        drain(ws).await;
    })
    .await;
    let overlay = OverlayState::new();

    let result = timeout(
        Duration::from_secs(10),
        supervise(&config(&endpoint), &fast_policy(2), &overlay),
    )
    .await
    .expect("supervisor should return on stream end");

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(
        overlay.session().connection_status,
        ConnectionStatus::StreamEnded
    );
}

#[tokio::test]
async fn join_failure_stops_supervisor() {
    let (endpoint, connections) = serve(|mut ws, _| async move {
        accept_namespace(&mut ws).await;
        next_text(&mut ws).await;
        send_text(&mut ws, r#"42["setUniqueIdFailed","LIVE has ended"]"#).await;
        drain(ws).await;
    })
    .await;
    let overlay = OverlayState::new();

    let result = timeout(
        Duration::from_secs(10),
        supervise(&config(&endpoint), &fast_policy(2), &overlay),
    )
    .await
    .expect("supervisor should return on join failure");

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(
        overlay.session().connection_status,
        ConnectionStatus::Failed {
            reason: "LIVE has ended".into()
        }
    );
}

#[tokio::test]
async fn dropped_session_after_join_reconnects() {
    let (endpoint, connections) = serve(|mut ws, index| async move {
        accept_namespace(&mut ws).await;
        confirm_join(&mut ws).await;
        if index == 0 {
            send_text(&mut ws, "41").await;
        } else {
            send_text(&mut ws, r#"42["streamEnd",{}]"#).await;
            drain(ws).await;
        }
    })
    .await;
    let overlay = OverlayState::new();

    let result = timeout(
        Duration::from_secs(10),
        supervise(&config(&endpoint), &fast_policy(0), &overlay),
    )
    .await
    .unwrap();

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert_eq!(
        overlay.session().connection_status,
        ConnectionStatus::StreamEnded
    );
}
