/// Resilience helpers for long-lived realtime connections
///
/// This library provides the connection policies used by overlay clients:
/// - **Timeout**: Bounds handshakes and other one-shot awaits
/// - **Retry**: Exponential backoff with jitter for (re)connect attempts
/// - **Presets**: Pre-tuned settings for realtime channel connects
///
/// Retry policy deliberately lives outside the channel adapters: adapters
/// report a failed attempt once, the caller decides whether to try again.
///
/// # Example: Connect with backoff
///
/// ```rust,no_run
/// use resilience::{presets, with_retry};
///
/// #[tokio::main]
/// async fn main() {
///     let policy = presets::channel_connect_config();
///
///     let result = with_retry(policy.retry, || async {
///         // Open the websocket here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

pub use presets::{channel_connect_config, ConnectPolicy};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutConfig, TimeoutError};
