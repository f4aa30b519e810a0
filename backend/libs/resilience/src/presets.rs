/// Preset policies for realtime channel connections
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Policy bundle for establishing a duplex channel
#[derive(Debug, Clone)]
pub struct ConnectPolicy {
    /// Bound on a single connect + namespace handshake
    pub handshake: TimeoutConfig,
    pub retry: RetryConfig,
}

/// Socket.IO style channel connects
///
/// - Handshake timeout: 10s
/// - Retry: 3 attempts, 1s initial backoff doubling up to 30s
pub fn channel_connect_config() -> ConnectPolicy {
    ConnectPolicy {
        handshake: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        retry: RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        },
    }
}
